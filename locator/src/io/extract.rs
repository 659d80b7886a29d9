//! Header decoding and payload read for a located marker.

use std::io::{Read, Seek, SeekFrom};

use anyhow::{Context, Result};
use tracing::{debug, instrument, warn};

use crate::core::header::{CorruptHeader, HEADER_REGION_BYTES, parse_header};
use crate::core::marker::MARKER_LEN;
use crate::core::types::{Extraction, SingleExecutableInfo, Unavailable};
use crate::io::options::expand_options;
use crate::io::scan::read_up_to;

/// Decode the header at the stream's current position and read the payload.
///
/// The stream must be positioned at the marker. A header that does not
/// conform yields [`Extraction::Corrupt`]; a payload that cannot be read in
/// full yields [`Extraction::Unavailable`]. I/O failures are returned as
/// errors.
#[instrument(skip_all, fields(max_payload_bytes = max_payload_bytes))]
pub fn extract<R: Read + Seek>(stream: &mut R, max_payload_bytes: u64) -> Result<Extraction> {
    let header_start = stream.stream_position().context("locate header")?;

    let mut region = [0u8; HEADER_REGION_BYTES];
    let filled = read_up_to(stream, &mut region).context("read header region")?;
    debug!(header_start, filled, "header region read");

    let layout = match parse_header(&region[..filled], MARKER_LEN) {
        Ok(layout) => layout,
        Err(err) => return Ok(Extraction::Corrupt(err)),
    };
    let options = match expand_options(layout.options) {
        Ok(options) => options,
        Err(err) => return Ok(Extraction::Corrupt(CorruptHeader::Options(err))),
    };

    let payload_offset = header_start + layout.payload_start as u64;
    let declared = layout.payload_len;
    debug!(payload_offset, declared, options = options.len(), "header decoded");

    if declared > max_payload_bytes {
        return Ok(Extraction::Unavailable(Unavailable::PayloadTooLarge {
            declared,
            limit: max_payload_bytes,
        }));
    }
    let mut payload = Vec::new();
    let reserved = usize::try_from(declared)
        .ok()
        .and_then(|len| payload.try_reserve_exact(len).ok());
    if reserved.is_none() {
        return Ok(Extraction::Unavailable(Unavailable::AllocationFailed { declared }));
    }

    stream
        .seek(SeekFrom::Start(payload_offset))
        .with_context(|| format!("seek to payload at {payload_offset}"))?;
    let actual = stream
        .take(declared)
        .read_to_end(&mut payload)
        .context("read payload")? as u64;

    if actual < declared {
        warn!(expected = declared, actual, "payload truncated");
        return Ok(Extraction::Unavailable(Unavailable::Truncated {
            expected: declared,
            actual,
        }));
    }

    Ok(Extraction::Ready(SingleExecutableInfo {
        valid: true,
        options,
        payload_offset,
        payload,
    }))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::core::marker::marker;
    use crate::test_support::encode_block;

    fn positioned(prefix: usize, block: Vec<u8>) -> Cursor<Vec<u8>> {
        let mut bytes = vec![0x90; prefix];
        bytes.extend(block);
        let mut stream = Cursor::new(bytes);
        stream.set_position(prefix as u64);
        stream
    }

    fn ready(extraction: Extraction) -> SingleExecutableInfo {
        match extraction {
            Extraction::Ready(info) => info,
            other => panic!("expected ready, got {other:?}"),
        }
    }

    #[test]
    fn round_trips_options_and_payload() {
        for len in [0usize, 1, 4095, 1 << 20] {
            let payload: Vec<u8> = (0..len).map(|i| (i * 7 % 251) as u8).collect();
            let mut stream = positioned(100, encode_block("-a -b", &payload));
            let info = ready(extract(&mut stream, u64::MAX).expect("extract"));
            assert!(info.valid);
            assert_eq!(info.options, vec!["-a", "-b"]);
            assert_eq!(info.payload, payload, "payload of {len} bytes");
            let header_len = MARKER_LEN + "-a -b".len() + 1 + len.to_string().len() + 1;
            assert_eq!(info.payload_offset, (100 + header_len) as u64);
        }
    }

    #[test]
    fn payload_followed_by_trailing_bytes() {
        let mut block = encode_block("", b"console.log(1)");
        block.extend_from_slice(b"trailing garbage");
        let mut stream = positioned(0, block);
        let info = ready(extract(&mut stream, u64::MAX).expect("extract"));
        assert!(info.options.is_empty());
        assert_eq!(info.payload, b"console.log(1)");
    }

    #[test]
    fn truncated_payload_is_unavailable() {
        let mut block = encode_block("-a", b"0123456789");
        block.truncate(block.len() - 4);
        let mut stream = positioned(8, block);
        let extraction = extract(&mut stream, u64::MAX).expect("extract");
        assert_eq!(
            extraction,
            Extraction::Unavailable(Unavailable::Truncated {
                expected: 10,
                actual: 6
            })
        );
    }

    #[test]
    fn header_without_terminator_is_corrupt() {
        let mut block = marker();
        block.extend(vec![b'x'; HEADER_REGION_BYTES]);
        let mut stream = positioned(0, block);
        let extraction = extract(&mut stream, u64::MAX).expect("extract");
        assert_eq!(
            extraction,
            Extraction::Corrupt(CorruptHeader::MissingOptionsTerminator)
        );
    }

    #[test]
    fn header_cut_at_end_of_file_is_corrupt() {
        let mut block = marker();
        block.extend_from_slice(b"-a\x0012");
        let mut stream = positioned(0, block);
        let extraction = extract(&mut stream, u64::MAX).expect("extract");
        assert_eq!(
            extraction,
            Extraction::Corrupt(CorruptHeader::MissingLengthTerminator)
        );
    }

    #[test]
    fn command_substitution_in_options_is_corrupt() {
        let mut stream = positioned(0, encode_block("$(reboot)", b"x"));
        let extraction = extract(&mut stream, u64::MAX).expect("extract");
        assert!(matches!(
            extraction,
            Extraction::Corrupt(CorruptHeader::Options(_))
        ));
    }

    #[test]
    fn oversized_payload_is_unavailable() {
        let mut stream = positioned(0, encode_block("", &[1; 64]));
        let extraction = extract(&mut stream, 63).expect("extract");
        assert_eq!(
            extraction,
            Extraction::Unavailable(Unavailable::PayloadTooLarge {
                declared: 64,
                limit: 63
            })
        );
    }

    #[test]
    fn unallocatable_payload_is_unavailable() {
        let mut block = marker();
        block.extend_from_slice(b"\x0018446744073709551615\x00");
        let mut stream = positioned(0, block);
        let extraction = extract(&mut stream, u64::MAX).expect("extract");
        assert!(matches!(
            extraction,
            Extraction::Unavailable(Unavailable::AllocationFailed { .. })
        ));
    }
}
