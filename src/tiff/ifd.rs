//! Image File Directory (IFD) structures and methods
//!
//! An IFD is the tag table that describes one image in a TIFF file. Only
//! the first IFD of a file is decoded; overviews and masks chained after
//! it are ignored.

use std::collections::HashMap;
use std::fmt;
use log::trace;

use crate::tiff::constants::{field_types, tags};

/// Represents an Image File Directory (IFD) in a TIFF file
#[derive(Debug, Clone)]
pub struct IFD {
    /// Entries in this IFD, in file order
    pub entries: Vec<IFDEntry>,
    /// Offset to this IFD in the file
    pub offset: u64,
    /// Cached tag values for quick lookup
    tag_map: HashMap<u16, IFDEntry>,
}

/// Represents an entry in an Image File Directory (IFD)
///
/// `raw` keeps the four value bytes exactly as stored, so inline values
/// shorter than a LONG can be decoded with the file's byte order.
#[derive(Debug, Clone)]
pub struct IFDEntry {
    /// TIFF tag identifier
    pub tag: u16,
    /// Field type
    pub field_type: u16,
    /// Number of values
    pub count: u32,
    /// Value or offset to values, decoded as a LONG
    pub value_offset: u32,
    /// Undecoded value bytes
    pub raw: [u8; 4],
}

impl IFDEntry {
    /// Creates a new IFD entry
    pub fn new(tag: u16, field_type: u16, count: u32, value_offset: u32, raw: [u8; 4]) -> Self {
        IFDEntry { tag, field_type, count, value_offset, raw }
    }

    /// Total byte length of this entry's values, if the field type is known
    pub fn byte_len(&self) -> Option<usize> {
        field_types::size_of(self.field_type).map(|size| size * self.count as usize)
    }

    /// Determines if the value is stored inline in the entry
    pub fn is_value_inline(&self) -> bool {
        matches!(self.byte_len(), Some(len) if len <= 4)
    }
}

impl IFD {
    /// Creates an empty IFD located at `offset`
    pub fn new(offset: u64) -> Self {
        Self {
            entries: Vec::new(),
            offset,
            tag_map: HashMap::new(),
        }
    }

    /// Adds an entry to this IFD
    pub fn add_entry(&mut self, entry: IFDEntry) {
        trace!("IFD entry: tag={}, type={}, count={}, value/offset={}",
               entry.tag, entry.field_type, entry.count, entry.value_offset);

        self.tag_map.insert(entry.tag, entry.clone());
        self.entries.push(entry);
    }

    /// Checks if this IFD has a specific tag
    pub fn has_tag(&self, tag: u16) -> bool {
        self.tag_map.contains_key(&tag)
    }

    /// Gets an IFD entry by tag
    pub fn get_entry(&self, tag: u16) -> Option<&IFDEntry> {
        self.tag_map.get(&tag)
    }

    /// Gets the number of entries in this IFD
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Whether the image is stored in tiles rather than strips
    pub fn is_tiled(&self) -> bool {
        self.has_tag(tags::TILE_WIDTH) || self.has_tag(tags::TILE_OFFSETS)
    }
}

impl fmt::Display for IFD {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "IFD (offset: {})", self.offset)?;
        writeln!(f, "  Number of entries: {}", self.entries.len())?;
        for entry in &self.entries {
            writeln!(f, "    {} [type {}] x{}: {}",
                     entry.tag, entry.field_type, entry.count, entry.value_offset)?;
        }
        Ok(())
    }
}
