//! Locator configuration (TOML).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::marker::MARKER_LEN;
use crate::io::scan::DEFAULT_WINDOW_BYTES;

/// Tuning for the image scan and payload read.
///
/// Missing fields take the defaults used by the startup lookup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LocatorConfig {
    /// Size of the sliding search window in bytes.
    pub window_bytes: usize,

    /// Largest payload that will be read into memory.
    pub max_payload_bytes: u64,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            window_bytes: DEFAULT_WINDOW_BYTES,
            max_payload_bytes: 4 << 30,
        }
    }
}

impl LocatorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.window_bytes <= MARKER_LEN {
            return Err(anyhow!(
                "window_bytes must be larger than the {MARKER_LEN} byte marker"
            ));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `LocatorConfig::default()`.
pub fn load_config(path: &Path) -> Result<LocatorConfig> {
    if !path.exists() {
        let cfg = LocatorConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: LocatorConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &LocatorConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
