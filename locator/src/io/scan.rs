//! Bounded-memory marker search over a seekable stream.

use std::io::{ErrorKind, Read, Seek, SeekFrom};

use anyhow::{Context, Result, bail};
use memchr::memmem::Finder;
use tracing::{debug, instrument};

/// Default search window: 1 MiB.
pub const DEFAULT_WINDOW_BYTES: usize = 1 << 20;

/// Find the first occurrence of `needle` in `stream`.
///
/// The stream is read from its start through a single window of
/// `window_bytes`. Between refills the last `needle.len()` bytes are carried
/// to the front so an occurrence straddling two reads is still found. On a
/// match the stream is left positioned at the returned absolute offset.
#[instrument(skip_all, fields(needle_len = needle.len(), window_bytes = window_bytes))]
pub fn find_marker<R: Read + Seek>(
    stream: &mut R,
    needle: &[u8],
    window_bytes: usize,
) -> Result<Option<u64>> {
    if needle.is_empty() || window_bytes <= needle.len() {
        bail!(
            "search window of {} bytes cannot hold a {} byte marker",
            window_bytes,
            needle.len()
        );
    }
    stream
        .seek(SeekFrom::Start(0))
        .context("rewind image for marker search")?;

    let finder = Finder::new(needle);
    let mut window = vec![0u8; window_bytes];
    let mut consumed: u64 = 0;

    let read = read_up_to(stream, &mut window)?;
    consumed += read as u64;
    if let Some(index) = finder.find(&window[..read]) {
        let offset = consumed - read as u64 + index as u64;
        return position_at(stream, offset).map(Some);
    }

    let carry = needle.len();
    let mut exhausted = read < window_bytes;
    while !exhausted {
        window.copy_within(window_bytes - carry.., 0);
        let read = read_up_to(stream, &mut window[carry..])?;
        consumed += read as u64;
        exhausted = read < window_bytes - carry;
        debug!(consumed, read, "window refilled");

        if let Some(index) = finder.find(&window[..carry + read]) {
            let offset = consumed - read as u64 - carry as u64 + index as u64;
            return position_at(stream, offset).map(Some);
        }
    }

    debug!(consumed, "marker not found");
    Ok(None)
}

/// Read until `buf` is full or the stream ends; returns the bytes read.
pub fn read_up_to<R: Read>(stream: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match stream.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err).context("read image"),
        }
    }
    Ok(filled)
}

fn position_at<R: Seek>(stream: &mut R, offset: u64) -> Result<u64> {
    debug!(offset, "marker found");
    stream
        .seek(SeekFrom::Start(offset))
        .with_context(|| format!("seek to marker at {offset}"))
}
