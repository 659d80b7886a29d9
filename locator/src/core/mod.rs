//! Deterministic, pure logic for locating and decoding the embedded block.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! bytes and return deterministic outputs suitable for tests.

pub mod fuse;
pub mod header;
pub mod marker;
pub mod types;
pub mod words;
