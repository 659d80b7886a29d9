//! Marker that introduces the embedded block.
//!
//! The marker is kept as separate parts and only assembled at runtime. If the
//! contiguous marker were a literal in this crate, it would sit in the image's
//! read-only data and the scan would find it before the appended block.

pub const MAGIC_HEADER: &str = "JSCODE";
pub const FORMAT_VERSION: u32 = 1;
pub const FORMAT_FLAGS: u32 = 0;
/// Width of the zero-padded decimal version and flag tags.
pub const TAG_WIDTH: usize = 8;
pub const MARKER_LEN: usize = MAGIC_HEADER.len() + 2 * TAG_WIDTH;

/// Assemble the marker bytes (`JSCODE00000001` followed by the flag tag).
pub fn marker() -> Vec<u8> {
    let marker = format!(
        "{}{:0width$}{:0width$}",
        std::hint::black_box(MAGIC_HEADER),
        FORMAT_VERSION,
        FORMAT_FLAGS,
        width = TAG_WIDTH
    );
    marker.into_bytes()
}
