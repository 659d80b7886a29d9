//! Locate and extract a payload appended to the running executable.
//!
//! A packaged binary carries a block after its own bytes: a marker, shell-style
//! startup options, a decimal length and the payload itself. The lookup is
//! switched on by a fuse byte patched into the binary after linking, so
//! unpackaged builds never read their own image.
//!
//! - **[`core`]**: Pure, deterministic logic (fuse layout, marker, header
//!   decoding, word expansion). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (opening images, streaming search,
//!   payload reads, configuration).
//!
//! [`single_executable`] ties both into the once-per-process startup lookup.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod single_executable;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
