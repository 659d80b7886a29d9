//! I/O helpers for the payload lookup.

pub mod config;
pub mod extract;
pub mod image;
pub mod options;
pub mod scan;
