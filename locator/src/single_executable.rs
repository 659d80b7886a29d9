//! Startup lookup of the payload embedded in the running executable.
//!
//! The pipeline runs top-down: fuse gate, self-locator, marker search, header
//! and payload extraction. It runs at most once per [`Locator`]; the
//! process-wide locator backs [`info`].

use std::sync::{LazyLock, OnceLock};

use tracing::{debug, error, info, warn};

use crate::core::fuse::{FusePosition, check_fuse, is_feature_enabled};
use crate::core::marker::marker;
use crate::core::types::{Extraction, SingleExecutableInfo, Unavailable};
use crate::io::config::LocatorConfig;
use crate::io::extract::extract;
use crate::io::image::{CurrentExecutable, ImageSource};
use crate::io::scan::find_marker;

/// Decides whether a lookup may touch the image at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate {
    /// The fuse compiled into this binary.
    Embedded,
    /// An explicit fuse sequence.
    Sequence(Vec<u8>),
    /// Always search; used to inspect arbitrary files.
    Open,
}

impl Gate {
    pub fn is_open(&self) -> bool {
        match self {
            Gate::Embedded => check_fuse(FusePosition::SingleExecutable),
            Gate::Sequence(fuse) => is_feature_enabled(fuse, FusePosition::SingleExecutable),
            Gate::Open => true,
        }
    }
}

/// One image source with its write-once lookup result.
pub struct Locator<S> {
    gate: Gate,
    source: S,
    config: LocatorConfig,
    info: OnceLock<SingleExecutableInfo>,
}

impl<S: ImageSource> Locator<S> {
    pub fn new(gate: Gate, source: S, config: LocatorConfig) -> Self {
        Self {
            gate,
            source,
            config,
            info: OnceLock::new(),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// The lookup result, computed on first use.
    ///
    /// A corrupt header aborts the process.
    pub fn info(&self) -> &SingleExecutableInfo {
        self.info.get_or_init(|| match self.lookup() {
            Extraction::Ready(found) => {
                info!(
                    payload_offset = found.payload_offset,
                    payload_len = found.payload.len(),
                    options = found.options.len(),
                    "embedded payload loaded"
                );
                found
            }
            Extraction::Unavailable(reason) => {
                if reason == Unavailable::FuseDisabled {
                    debug!("single executable fuse not set");
                } else {
                    warn!(reason = %reason, "embedded payload unavailable");
                }
                SingleExecutableInfo::default()
            }
            Extraction::Corrupt(err) => {
                error!(err = %err, "embedded header is corrupt, aborting");
                std::process::abort();
            }
        })
    }

    /// Run the pipeline once, bypassing the cache.
    ///
    /// The image stream and search window are released before this returns.
    pub fn lookup(&self) -> Extraction {
        if !self.gate.is_open() {
            return Extraction::Unavailable(Unavailable::FuseDisabled);
        }
        let mut stream = match self.source.open() {
            Ok(stream) => stream,
            Err(reason) => return Extraction::Unavailable(reason),
        };

        let needle = marker();
        let found = match find_marker(&mut stream, &needle, self.config.window_bytes) {
            Ok(Some(offset)) => offset,
            Ok(None) => return Extraction::Unavailable(Unavailable::MarkerNotFound),
            Err(err) => return Extraction::Unavailable(Unavailable::Read(format!("{err:#}"))),
        };
        debug!(marker_offset = found, "marker located");

        match extract(&mut stream, self.config.max_payload_bytes) {
            Ok(extraction) => extraction,
            Err(err) => Extraction::Unavailable(Unavailable::Read(format!("{err:#}"))),
        }
    }
}

static PROCESS: LazyLock<Locator<CurrentExecutable>> = LazyLock::new(|| {
    Locator::new(Gate::Embedded, CurrentExecutable, LocatorConfig::default())
});

/// Payload lookup for the running executable, gated by the embedded fuse.
pub fn info() -> &'static SingleExecutableInfo {
    PROCESS.info()
}

/// Run the startup lookup if it has not run yet.
pub fn initialize() {
    let _ = info();
}
