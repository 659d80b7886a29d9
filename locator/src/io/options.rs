//! Expansion of the embedded options field against the live environment.

use glob::MatchOptions;
use tracing::debug;

use crate::core::words::{Word, WordError, split_words};

/// Expand the raw options field using process environment variables and the
/// filesystem for glob patterns.
pub fn expand_options(raw: &[u8]) -> Result<Vec<String>, WordError> {
    expand_options_with(raw, &|name| std::env::var(name).ok())
}

/// Expand the raw options field with an explicit parameter lookup.
pub fn expand_options_with<F>(raw: &[u8], lookup: &F) -> Result<Vec<String>, WordError>
where
    F: Fn(&str) -> Option<String>,
{
    let text = std::str::from_utf8(raw).map_err(|_| WordError::InvalidUtf8)?;
    let words = split_words(text, lookup)?;
    Ok(words.into_iter().flat_map(expand_glob).collect())
}

/// Replace a pattern word with its sorted matches, or keep it as written
/// when nothing matches. Wildcards never match a leading dot.
fn expand_glob(word: Word) -> Vec<String> {
    let Some(pattern) = word.pattern else {
        return vec![word.text];
    };
    let options = MatchOptions {
        require_literal_leading_dot: true,
        ..MatchOptions::new()
    };
    let matches: Vec<String> = match glob::glob_with(&pattern, options) {
        Ok(paths) => paths
            .filter_map(Result::ok)
            .map(|path| path.to_string_lossy().into_owned())
            .collect(),
        Err(err) => {
            debug!(pattern = %pattern, err = %err, "invalid glob pattern kept literally");
            Vec::new()
        }
    };
    if matches.is_empty() {
        vec![word.text]
    } else {
        matches
    }
}
