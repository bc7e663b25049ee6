//! A directory node: its slice into the archive-wide flat arrays, and the
//! index views resolved from those slices. See spec §3.2 and §4.6.

use crate::archive::attributes::Attributes;
use crate::io::{Endian, Reader, Writer};
use bstr::BString;

pub(crate) const HEADER_SIZE: u64 = 0x20;

#[derive(Clone, Debug)]
pub struct Directory {
    pub name: BString,
    pub(crate) dir_count: u32,
    pub(crate) first_dir_index: u32,
    pub(crate) file_count: u32,
    pub(crate) first_file_index: u32,
    pub attributes: Attributes,
    /// Indices into the archive's flat `directories[]`, resolved after parse.
    pub(crate) subdirectories: Vec<usize>,
    /// Indices into the archive's flat `files[]`, resolved after parse.
    pub(crate) files: Vec<usize>,
}

impl Default for Directory {
    fn default() -> Self {
        Self {
            name: BString::from(""),
            dir_count: 0,
            first_dir_index: 0,
            file_count: 0,
            first_file_index: 0,
            attributes: Attributes::DIRECTORY,
            subdirectories: Vec::new(),
            files: Vec::new(),
        }
    }
}

impl Directory {
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.name.is_empty() || self.name.as_slice() == b"."
    }

    #[must_use]
    pub fn is_leaf(&self, archive_dir_count: u32) -> bool {
        self.dir_count == 0 && self.first_dir_index == archive_dir_count
    }

    pub(crate) fn read_header(reader: &mut Reader<'_>, endian: Endian) -> std::io::Result<Self> {
        let dir_count: u32 = reader.read(endian)?;
        let first_dir_index: u32 = reader.read(endian)?;
        let file_count: u32 = reader.read(endian)?;
        let first_file_index: u32 = reader.read(endian)?;
        let attributes: u32 = reader.read(endian)?;
        let mut reserved = [0u8; 12];
        reader.read_into(&mut reserved)?;

        Ok(Self {
            name: BString::from(""),
            dir_count,
            first_dir_index,
            file_count,
            first_file_index,
            attributes: Attributes::from_bits_opaque(attributes),
            subdirectories: Vec::new(),
            files: Vec::new(),
        })
    }

    pub(crate) fn write_header(&self, writer: &mut Writer, endian: Endian) -> std::io::Result<()> {
        writer.write(&self.dir_count, endian)?;
        writer.write(&self.first_dir_index, endian)?;
        writer.write(&self.file_count, endian)?;
        writer.write(&self.first_file_index, endian)?;
        writer.write(&self.attributes.bits(), endian)?;
        writer.write_bytes(&[0u8; 12])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Directory;

    #[test]
    fn empty_or_dot_name_is_root() {
        let mut d = Directory::default();
        assert!(d.is_root());
        d.name = bstr::BString::from(".");
        assert!(d.is_root());
        d.name = bstr::BString::from("sub");
        assert!(!d.is_root());
    }

    #[test]
    fn leaf_sentinel_matches_archive_dir_count() {
        let mut d = Directory {
            first_dir_index: 5,
            ..Directory::default()
        };
        assert!(d.is_leaf(5));
        d.first_dir_index = 3;
        assert!(!d.is_leaf(5));
    }
}
