//! Self-contained executable payload locator.
//!
//! Runs the embedded payload lookup at startup, then reports on it or on
//! another packaged file.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use locator::core::fuse::{FusePosition, check_fuse};
use locator::core::types::SingleExecutableInfo;
use locator::exit_codes;
use locator::io::config::{LocatorConfig, load_config, write_config};
use locator::io::image::PathImage;
use locator::logging;
use locator::single_executable::{self, Gate, Locator};

#[derive(Parser)]
#[command(
    name = "locator",
    version,
    about = "Locate the payload embedded in a packaged executable"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Report the payload embedded in this executable as JSON.
    Status,
    /// Write the payload embedded in this executable to stdout.
    Payload,
    /// Report the payload embedded in FILE as JSON, ignoring fuses.
    Inspect {
        file: PathBuf,
        /// TOML file with scan settings.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print whether the single executable fuse of this binary is set.
    Fuse,
    /// Print the effective scan settings as TOML.
    Config {
        /// TOML file to read; defaults apply when omitted or missing.
        file: Option<PathBuf>,
        /// Also write the settings to this path.
        #[arg(long)]
        write: Option<PathBuf>,
    },
}

/// JSON view of a lookup result.
#[derive(Serialize)]
struct Summary<'a> {
    valid: bool,
    options: &'a [String],
    payload_offset: u64,
    payload_len: usize,
    payload: String,
}

impl<'a> From<&'a SingleExecutableInfo> for Summary<'a> {
    fn from(info: &'a SingleExecutableInfo) -> Self {
        Self {
            valid: info.valid,
            options: &info.options,
            payload_offset: info.payload_offset,
            payload_len: info.payload.len(),
            payload: String::from_utf8_lossy(&info.payload).into_owned(),
        }
    }
}

fn main() {
    logging::init();
    single_executable::initialize();

    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Status => report(single_executable::info()),
        Command::Payload => cmd_payload(),
        Command::Inspect { file, config } => cmd_inspect(&file, config.as_deref()),
        Command::Fuse => {
            let enabled = check_fuse(FusePosition::SingleExecutable);
            println!("{}", if enabled { "enabled" } else { "disabled" });
            Ok(exit_codes::OK)
        }
        Command::Config { file, write } => cmd_config(file.as_deref(), write.as_deref()),
    }
}

fn cmd_payload() -> Result<i32> {
    let info = single_executable::info();
    if !info.valid {
        return Ok(exit_codes::UNAVAILABLE);
    }
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&info.payload).context("write payload")?;
    stdout.flush().context("flush payload")?;
    Ok(exit_codes::OK)
}

fn effective_config(path: Option<&Path>) -> Result<LocatorConfig> {
    match path {
        Some(path) => load_config(path),
        None => Ok(LocatorConfig::default()),
    }
}

fn cmd_inspect(file: &Path, config: Option<&Path>) -> Result<i32> {
    let config = effective_config(config)?;
    let locator = Locator::new(Gate::Open, PathImage(file.to_path_buf()), config);
    report(locator.info())
}

fn cmd_config(file: Option<&Path>, write: Option<&Path>) -> Result<i32> {
    let config = effective_config(file)?;
    if let Some(path) = write {
        write_config(path, &config)?;
    }
    print!("{}", toml::to_string_pretty(&config).context("serialize config toml")?);
    Ok(exit_codes::OK)
}

fn report(info: &SingleExecutableInfo) -> Result<i32> {
    let summary = serde_json::to_string_pretty(&Summary::from(info)).context("serialize summary")?;
    println!("{summary}");
    Ok(if info.valid {
        exit_codes::OK
    } else {
        exit_codes::UNAVAILABLE
    })
}
