//! Shell-style word expansion for the embedded startup options.
//!
//! Follows `wordexp(3)` with command substitution disabled: quoting,
//! parameter and tilde expansion, field splitting, and glob patterns.
//! Nothing here runs a process.

use glob::Pattern;
use thiserror::Error;

/// Default `IFS`: unquoted expansion results are split on these.
const FIELD_SEPARATORS: [char; 3] = [' ', '\t', '\n'];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WordError {
    #[error("command substitution is disabled")]
    CommandSubstitution,
    #[error("unquoted special character {0:?}")]
    BadCharacter(char),
    #[error("unterminated {0} quote")]
    UnterminatedQuote(&'static str),
    #[error("unterminated parameter expansion")]
    UnterminatedBrace,
    #[error("trailing backslash")]
    TrailingBackslash,
    #[error("options are not valid utf-8")]
    InvalidUtf8,
}

/// One expanded word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    /// Word text after quote removal and parameter expansion.
    pub text: String,
    /// Glob pattern when an unquoted part carries `*`, `?` or `[`; quoted
    /// parts are escaped inside it.
    pub pattern: Option<String>,
}

#[derive(Default)]
struct WordBuilder {
    text: String,
    pattern: String,
    globbable: bool,
    started: bool,
}

impl WordBuilder {
    fn push_literal(&mut self, s: &str) {
        self.text.push_str(s);
        self.pattern.push_str(&Pattern::escape(s));
        self.started = true;
    }

    fn push_unquoted(&mut self, s: &str) {
        if s.is_empty() {
            return;
        }
        if s.contains(['*', '?', '[']) {
            self.globbable = true;
        }
        self.text.push_str(s);
        self.pattern.push_str(s);
        self.started = true;
    }

    fn finish(&mut self) -> Option<Word> {
        let builder = std::mem::take(self);
        if !builder.started {
            return None;
        }
        Some(Word {
            text: builder.text,
            pattern: builder.globbable.then_some(builder.pattern),
        })
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Quote {
    None,
    Double,
}

struct Splitter<'a, F> {
    lookup: &'a F,
    words: Vec<Word>,
    word: WordBuilder,
    /// Pending text awaiting parameter expansion.
    run: String,
    run_quote: Quote,
}

impl<F> Splitter<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn expand(&self, s: &str) -> String {
        shellexpand::env_with_context_no_errors(s, |name: &str| {
            Some((self.lookup)(name).unwrap_or_default())
        })
        .into_owned()
    }

    fn push_run_char(&mut self, quote: Quote, c: char) {
        if self.run_quote != quote {
            self.flush_run();
            self.run_quote = quote;
        }
        self.run.push(c);
    }

    fn flush_run(&mut self) {
        if self.run.is_empty() {
            if self.run_quote == Quote::Double {
                // `""` still produces a word.
                self.word.started = true;
            }
            return;
        }
        let run = std::mem::take(&mut self.run);
        match self.run_quote {
            Quote::None => {
                let rest = match self.tilde_prefix(&run) {
                    Some((home, rest)) => {
                        self.word.push_literal(&home);
                        rest
                    }
                    None => run.as_str(),
                };
                let expanded = self.expand(rest);
                self.push_fields(&expanded);
            }
            Quote::Double => {
                let expanded = self.expand(&run);
                self.word.push_literal(&expanded);
            }
        }
    }

    /// Push unquoted expansion output, starting a new word at each run of
    /// separators. The first and last fields join the surrounding text.
    fn push_fields(&mut self, expanded: &str) {
        let mut fields = expanded.split(FIELD_SEPARATORS);
        if let Some(first) = fields.next() {
            self.word.push_unquoted(first);
        }
        for field in fields {
            self.take_word();
            self.word.push_unquoted(field);
        }
    }

    fn take_word(&mut self) {
        if let Some(word) = self.word.finish() {
            self.words.push(word);
        }
    }

    /// Split a leading `~` or `~/` off a word, resolved to `$HOME`.
    fn tilde_prefix<'r>(&self, run: &'r str) -> Option<(String, &'r str)> {
        if self.word.started {
            return None;
        }
        let rest = run.strip_prefix('~')?;
        if !rest.is_empty() && !rest.starts_with('/') {
            return None;
        }
        Some(((self.lookup)("HOME").unwrap_or_default(), rest))
    }

    fn push_literal(&mut self, s: &str) {
        self.flush_run();
        self.word.push_literal(s);
    }

    fn end_word(&mut self) {
        self.flush_run();
        self.run_quote = Quote::None;
        self.take_word();
    }
}

/// Split and expand `input` into words.
///
/// `lookup` resolves parameters; unset parameters expand to nothing.
pub fn split_words<F>(input: &str, lookup: &F) -> Result<Vec<Word>, WordError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut splitter = Splitter {
        lookup,
        words: Vec::new(),
        word: WordBuilder::default(),
        run: String::new(),
        run_quote: Quote::None,
    };
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            ' ' | '\t' => splitter.end_word(),
            '\n' | '|' | '&' | ';' | '<' | '>' | '(' | ')' | '{' | '}' => {
                return Err(WordError::BadCharacter(c));
            }
            '`' => return Err(WordError::CommandSubstitution),
            '\\' => {
                let escaped = chars.next().ok_or(WordError::TrailingBackslash)?;
                splitter.push_literal(escaped.encode_utf8(&mut [0; 4]));
            }
            '\'' => {
                let mut quoted = String::new();
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) => quoted.push(c),
                        None => return Err(WordError::UnterminatedQuote("single")),
                    }
                }
                splitter.push_literal(&quoted);
            }
            '"' => {
                splitter.flush_run();
                splitter.run_quote = Quote::Double;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('`') => return Err(WordError::CommandSubstitution),
                        Some('\\') => match chars.peek().copied() {
                            Some(next @ ('$' | '`' | '"' | '\\' | '\n')) => {
                                chars.next();
                                splitter.push_literal(next.encode_utf8(&mut [0; 4]));
                            }
                            _ => splitter.push_run_char(Quote::Double, '\\'),
                        },
                        Some('$') => read_parameter(&mut chars, &mut splitter, Quote::Double)?,
                        Some(c) => splitter.push_run_char(Quote::Double, c),
                        None => return Err(WordError::UnterminatedQuote("double")),
                    }
                }
                splitter.flush_run();
                splitter.run_quote = Quote::None;
            }
            '$' => read_parameter(&mut chars, &mut splitter, Quote::None)?,
            c => splitter.push_run_char(Quote::None, c),
        }
    }
    splitter.end_word();

    Ok(splitter.words)
}

/// Consume a parameter reference after `$` into the pending run.
fn read_parameter<I, F>(
    chars: &mut std::iter::Peekable<I>,
    splitter: &mut Splitter<'_, F>,
    quote: Quote,
) -> Result<(), WordError>
where
    I: Iterator<Item = char>,
    F: Fn(&str) -> Option<String>,
{
    splitter.push_run_char(quote, '$');
    match chars.peek().copied() {
        Some('(') => Err(WordError::CommandSubstitution),
        Some('{') => {
            loop {
                match chars.next() {
                    Some('}') => {
                        splitter.push_run_char(quote, '}');
                        return Ok(());
                    }
                    Some(c) => splitter.push_run_char(quote, c),
                    None => return Err(WordError::UnterminatedBrace),
                }
            }
        }
        _ => Ok(()),
    }
}
