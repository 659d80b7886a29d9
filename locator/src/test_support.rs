//! Test-only helpers for composing augmented executable images.

use std::cell::Cell;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use memchr::memmem;
use tempfile::TempDir;

use crate::core::fuse::{FUSE_DECLARED_LENGTH, FUSE_ON, FUSE_SENTINEL, FUSE_VERSION, FusePosition};
use crate::core::marker::marker;
use crate::core::types::Unavailable;
use crate::io::image::ImageSource;

/// Encode a complete embedded block: marker, options, length, payload.
pub fn encode_block(options: &str, payload: &[u8]) -> Vec<u8> {
    let mut block = marker();
    block.extend_from_slice(options.as_bytes());
    block.push(0);
    block.extend_from_slice(payload.len().to_string().as_bytes());
    block.push(0);
    block.extend_from_slice(payload);
    block
}

/// Deterministic filler that never contains the marker.
pub fn filler(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 200) as u8 + 0x30).collect()
}

/// Switch on the single executable bit of every fuse in `image`.
///
/// Returns the number of fuses patched.
pub fn patch_fuse(image: &mut [u8]) -> usize {
    let header = [FUSE_VERSION, FUSE_DECLARED_LENGTH];
    let offset = FusePosition::SingleExecutable.offset();
    let starts: Vec<usize> = memmem::find_iter(image, &FUSE_SENTINEL).collect();
    let mut patched = 0;
    for start in starts {
        let fuse = &mut image[start..];
        if fuse.len() > offset && fuse[FUSE_SENTINEL.len()..offset] == header {
            fuse[offset] = FUSE_ON;
            patched += 1;
        }
    }
    patched
}

/// In-memory image that counts how often it is opened.
#[derive(Debug, Default)]
pub struct MemoryImage {
    bytes: Vec<u8>,
    opens: Cell<usize>,
}

impl MemoryImage {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            opens: Cell::new(0),
        }
    }

    /// `prefix_len` filler bytes followed by an encoded block.
    pub fn with_block(prefix_len: usize, options: &str, payload: &[u8]) -> Self {
        let mut bytes = filler(prefix_len);
        bytes.extend(encode_block(options, payload));
        Self::new(bytes)
    }

    pub fn opens(&self) -> usize {
        self.opens.get()
    }
}

impl ImageSource for MemoryImage {
    type Stream = Cursor<Vec<u8>>;

    fn open(&self) -> Result<Self::Stream, Unavailable> {
        self.opens.set(self.opens.get() + 1);
        if self.bytes.is_empty() {
            return Err(Unavailable::EmptyImage);
        }
        Ok(Cursor::new(self.bytes.clone()))
    }
}

/// A copy of an executable in a temporary directory, optionally with its
/// fuse switched on and bytes appended.
pub struct PackagedExecutable {
    _dir: TempDir,
    path: PathBuf,
}

impl PackagedExecutable {
    pub fn build(exe: &Path, enable_fuse: bool, tail: &[u8]) -> Result<Self> {
        let dir = tempfile::tempdir().context("create package dir")?;
        let name = exe.file_name().context("executable has no file name")?;
        let path = dir.path().join(name);

        let mut image = fs::read(exe).with_context(|| format!("read {}", exe.display()))?;
        if enable_fuse && patch_fuse(&mut image) == 0 {
            bail!("no fuse found in {}", exe.display());
        }
        image.extend_from_slice(tail);

        fs::write(&path, &image).with_context(|| format!("write {}", path.display()))?;
        let permissions = fs::metadata(exe)
            .with_context(|| format!("stat {}", exe.display()))?
            .permissions();
        fs::set_permissions(&path, permissions)
            .with_context(|| format!("chmod {}", path.display()))?;

        Ok(Self { _dir: dir, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
