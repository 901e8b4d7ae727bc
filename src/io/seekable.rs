//! Seekable reader trait
//!
//! The codec reads IFDs and strips from arbitrary offsets, so every input
//! source must support both reading and seeking.

use std::io::{Read, Seek};

/// Trait for readers that can both read and seek
pub trait SeekableReader: Read + Seek {}

impl<T: Read + Seek> SeekableReader for T {}
