//! Stable exit codes for locator CLI commands.

/// Command succeeded and a payload was found.
pub const OK: i32 = 0;
/// Command failed due to invalid arguments, config or I/O errors.
pub const INVALID: i32 = 1;
/// No usable payload (fuse off, no marker, truncated payload, ...).
pub const UNAVAILABLE: i32 = 2;
