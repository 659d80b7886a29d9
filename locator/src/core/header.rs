//! Layout of the header region that follows the marker.
//!
//! ```text
//! <marker> <options> NUL <decimal payload length> NUL <payload ...>
//! ```
//!
//! The region is read as a fixed-size block starting at the marker. Both
//! fields must be terminated inside the block, and neither terminator may be
//! its last byte.

use memchr::memchr;
use thiserror::Error;

use crate::core::words::WordError;

/// Bytes read from the marker offset to decode the header.
pub const HEADER_REGION_BYTES: usize = 1 << 12;

/// Reasons a header does not conform to the wire format.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorruptHeader {
    #[error("options field is not NUL-terminated within the header region")]
    MissingOptionsTerminator,
    #[error("payload length field is not NUL-terminated within the header region")]
    MissingLengthTerminator,
    #[error("payload length {0:?} is not a decimal integer")]
    InvalidLength(String),
    #[error("options cannot be expanded: {0}")]
    Options(#[from] WordError),
}

/// Field boundaries decoded from a header region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderLayout<'a> {
    /// Raw options text, without its terminator.
    pub options: &'a [u8],
    /// Declared payload size in bytes.
    pub payload_len: u64,
    /// Payload start, relative to the marker offset.
    pub payload_start: usize,
}

/// Decode the field boundaries of `region`.
///
/// `region` starts at the marker and holds the bytes actually read, at most
/// [`HEADER_REGION_BYTES`]. Bytes past its end count as missing.
pub fn parse_header(region: &[u8], marker_len: usize) -> Result<HeaderLayout<'_>, CorruptHeader> {
    let options_start = marker_len.min(region.len());
    let options_end =
        find_terminator(region, options_start).ok_or(CorruptHeader::MissingOptionsTerminator)?;

    let length_start = options_end + 1;
    let length_end =
        find_terminator(region, length_start).ok_or(CorruptHeader::MissingLengthTerminator)?;

    let payload_len = parse_length(&region[length_start..length_end])?;

    Ok(HeaderLayout {
        options: &region[options_start..options_end],
        payload_len,
        payload_start: length_end + 1,
    })
}

/// Index of the first NUL at or after `from`, unless it is the region's last byte.
fn find_terminator(region: &[u8], from: usize) -> Option<usize> {
    let pos = from + memchr(0, region.get(from..)?)?;
    (pos + 1 < HEADER_REGION_BYTES).then_some(pos)
}

fn parse_length(digits: &[u8]) -> Result<u64, CorruptHeader> {
    let invalid = || CorruptHeader::InvalidLength(String::from_utf8_lossy(digits).into_owned());
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return Err(invalid());
    }
    std::str::from_utf8(digits)
        .ok()
        .and_then(|text| text.parse::<u64>().ok())
        .ok_or_else(invalid)
}
