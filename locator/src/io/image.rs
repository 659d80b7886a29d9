//! Sources of executable images to search.

use std::fs::File;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::types::Unavailable;

/// Something that can be opened as a seekable byte stream.
pub trait ImageSource {
    type Stream: Read + Seek;

    fn open(&self) -> Result<Self::Stream, Unavailable>;
}

/// The executable of the running process.
#[derive(Debug, Clone, Copy, Default)]
pub struct CurrentExecutable;

impl ImageSource for CurrentExecutable {
    type Stream = File;

    fn open(&self) -> Result<File, Unavailable> {
        let path = current_executable_path().ok_or(Unavailable::PathUnresolved)?;
        open_image(&path)
    }
}

/// An image at a fixed path.
#[derive(Debug, Clone)]
pub struct PathImage(pub PathBuf);

impl ImageSource for PathImage {
    type Stream = File;

    fn open(&self) -> Result<File, Unavailable> {
        open_image(&self.0)
    }
}

/// Path of the running executable, if the platform can report it.
pub fn current_executable_path() -> Option<PathBuf> {
    match std::env::current_exe() {
        Ok(path) => Some(path),
        Err(err) => {
            debug!(err = %err, "current executable path unavailable");
            None
        }
    }
}

/// Open `path` for reading, rejecting anything that is not a non-empty file.
pub fn open_image(path: &Path) -> Result<File, Unavailable> {
    let file = File::open(path).map_err(|err| Unavailable::OpenFailed(err.to_string()))?;
    let metadata = file
        .metadata()
        .map_err(|err| Unavailable::OpenFailed(err.to_string()))?;
    if !metadata.is_file() {
        return Err(Unavailable::OpenFailed(format!(
            "{} is not a regular file",
            path.display()
        )));
    }
    if metadata.len() == 0 {
        return Err(Unavailable::EmptyImage);
    }
    debug!(path = %path.display(), len = metadata.len(), "opened image");
    Ok(file)
}
