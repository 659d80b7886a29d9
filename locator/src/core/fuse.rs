//! Post-link patchable feature fuse.
//!
//! The fuse is a fixed byte sequence compiled into the image with every
//! feature bit cleared. A packaging tool finds the sentinel in the final
//! binary and flips bits after it; the process only ever reads them.

/// Marks the start of the fuse. Never modified by the patcher.
pub const FUSE_SENTINEL: [u8; 32] = *b"dL7pKGdnNz796PbbjQWNKmHXBZaB9tsX";
pub const FUSE_VERSION: u8 = 1;
/// Number of feature bytes following the header.
pub const FUSE_DECLARED_LENGTH: u8 = 1;
pub const FUSE_ON: u8 = 1;
pub const FUSE_LEN: usize = FUSE_SENTINEL.len() + 2 + FUSE_DECLARED_LENGTH as usize;

/// Byte offsets of the feature bits, relative to the sentinel start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum FusePosition {
    SingleExecutable = FUSE_SENTINEL.len() + 2,
}

impl FusePosition {
    pub fn offset(self) -> usize {
        self as usize
    }
}

/// The embedded fuse, as laid out in the linked image.
#[used]
pub static FUSE: [u8; FUSE_LEN] = build_fuse();

const fn build_fuse() -> [u8; FUSE_LEN] {
    let mut fuse = [0u8; FUSE_LEN];
    let mut i = 0;
    while i < FUSE_SENTINEL.len() {
        fuse[i] = FUSE_SENTINEL[i];
        i += 1;
    }
    fuse[FUSE_SENTINEL.len()] = FUSE_VERSION;
    fuse[FUSE_SENTINEL.len() + 1] = FUSE_DECLARED_LENGTH;
    fuse
}

/// Returns true if the byte at `position` is switched on.
///
/// Positions past the end of `fuse` read as off.
pub fn is_feature_enabled(fuse: &[u8], position: FusePosition) -> bool {
    fuse.get(position.offset()).copied() == Some(FUSE_ON)
}

/// Check a feature bit of the embedded [`FUSE`].
///
/// The compiler sees `FUSE` as a constant with every bit cleared. The read
/// goes through `black_box` and this function is never inlined so the check
/// survives optimisation and observes the bytes the patcher wrote.
#[inline(never)]
pub fn check_fuse(position: FusePosition) -> bool {
    let fuse: &[u8] = std::hint::black_box(&FUSE);
    is_feature_enabled(fuse, position)
}
