//! Shared types for the payload lookup.

use thiserror::Error;

use crate::core::header::CorruptHeader;

/// What the process learned about its own embedded payload.
///
/// Created invalid, filled at most once, never changed afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SingleExecutableInfo {
    pub valid: bool,
    /// Expanded startup options, in order.
    pub options: Vec<String>,
    /// Absolute offset of the first payload byte within the image.
    pub payload_offset: u64,
    pub payload: Vec<u8>,
}

/// Why no payload is available. None of these stop the process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Unavailable {
    #[error("single executable fuse is not set")]
    FuseDisabled,
    #[error("path of the running executable could not be resolved")]
    PathUnresolved,
    #[error("image could not be opened: {0}")]
    OpenFailed(String),
    #[error("image is empty")]
    EmptyImage,
    #[error("no marker in image")]
    MarkerNotFound,
    #[error("image read failed: {0}")]
    Read(String),
    #[error("declared payload of {declared} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { declared: u64, limit: u64 },
    #[error("cannot allocate {declared} bytes for the payload")]
    AllocationFailed { declared: u64 },
    #[error("payload truncated: expected {expected} bytes, read {actual}")]
    Truncated { expected: u64, actual: u64 },
}

/// Outcome of one pass over an image.
///
/// `Corrupt` is kept apart from `Unavailable`: a header that does not
/// conform cannot be trusted and ends the process, while everything else
/// falls back to normal startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Ready(SingleExecutableInfo),
    Unavailable(Unavailable),
    Corrupt(CorruptHeader),
}

impl Extraction {
    pub fn is_ready(&self) -> bool {
        matches!(self, Extraction::Ready(_))
    }
}
