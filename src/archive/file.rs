//! A single archived file: its header fields, its bounded payload history,
//! and the encode/decode/serialize operations that act on it. See spec
//! §3.3 and §4.5.

use crate::archive::attributes::Attributes;
use crate::archive::history::History;
use crate::error::{Error, Result};
use crate::io::{Endian, Reader, Writer};
use crate::sllz;
use bstr::BString;

const COMPRESSED_FLAG: u32 = 0x8000_0000;
pub(crate) const HEADER_SIZE: u64 = 0x20;

/// What a `File::encode` call should do to the current plaintext payload.
#[derive(Clone, Copy, Debug)]
pub enum Encoding {
    Uncompressed,
    Sllz(sllz::Version),
}

fn split_offset(offset: u64) -> (u32, u32) {
    if offset <= u64::from(u32::MAX) {
        (offset as u32, 0)
    } else {
        #[allow(clippy::cast_possible_truncation)]
        let high24 = ((offset >> 32) & 0x00FF_FFFF) as u32;
        (u32::MAX, high24)
    }
}

fn join_offset(low32: u32, high24: u32) -> u64 {
    (u64::from(high24 & 0x00FF_FFFF) << 32) | u64::from(low32)
}

#[derive(Clone, Debug)]
pub struct File {
    pub name: BString,
    pub(crate) orig_compressed: bool,
    pub(crate) was_compressed: bool,
    pub size: i32,
    pub(crate) entry_length: u32,
    pub attributes: Attributes,
    pub timestamp: u64,
    pub(crate) data_offset: u64,
    pub(crate) containing_directory: Option<usize>,
    pub(crate) data_history: History,
}

impl Default for File {
    fn default() -> Self {
        Self {
            name: BString::from(""),
            orig_compressed: false,
            was_compressed: false,
            size: 0,
            entry_length: 0,
            attributes: Attributes::default(),
            timestamp: 0,
            data_offset: 0,
            containing_directory: None,
            data_history: History::new(),
        }
    }
}

impl File {
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.data_history.current().is_some()
    }

    #[must_use]
    pub fn is_compressed(&self) -> bool {
        self.data_history
            .current()
            .map_or(self.orig_compressed, |record| record.is_compressed)
    }

    #[must_use]
    pub fn data(&self) -> Option<&[u8]> {
        self.data_history.current().map(|record| record.bytes.as_slice())
    }

    /// Reads `entry_length` bytes into the history as the current payload,
    /// tagged with the compression state declared by the archive header.
    /// `offset`, when given, seeks before reading; when absent the reader
    /// is assumed already positioned.
    pub(crate) fn load_data(&mut self, reader: &mut Reader<'_>, offset: Option<u64>) -> Result<()> {
        if let Some(offset) = offset {
            reader.seek_absolute(offset as usize)?;
        }
        let bytes = reader.read_bytes(self.entry_length as usize)?.to_vec();
        self.data_history.add(bytes, self.orig_compressed);
        Ok(())
    }

    /// Decodes the current payload through SLLZ if (and only if) it is
    /// compressed. A declared-size disagreement from the codec is not
    /// fatal: `size` is updated to the actual decoded length and the
    /// mismatch is logged by [`sllz::unwrap`], unless `suppress_warnings`
    /// is set.
    pub fn decode(&mut self, suppress_warnings: bool) -> Result<()> {
        let current = self.data_history.current().ok_or(Error::DataNotLoaded)?;
        if !current.is_compressed {
            if !suppress_warnings {
                log::warn!("decode requested on {:?} but payload is already plaintext", self.name);
            }
            return Ok(());
        }

        let plain = sllz::unwrap(&current.bytes, suppress_warnings)?;
        self.was_compressed = true;
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let decoded_size = plain.len() as i32;
        self.size = decoded_size;
        self.data_history.add(plain, false);
        Ok(())
    }

    /// Encodes the current payload through SLLZ if (and only if) it is
    /// plaintext. The encoding is discarded unless it is smaller than the
    /// input or `force` is set.
    pub fn encode(&mut self, encoding: Encoding, endian: Endian, force: bool, suppress_warnings: bool) -> Result<()> {
        let current = self.data_history.current().ok_or(Error::DataNotLoaded)?;
        if current.is_compressed {
            if !suppress_warnings {
                log::warn!("encode requested on {:?} but payload is already compressed", self.name);
            }
            return Ok(());
        }

        let version = match encoding {
            Encoding::Uncompressed => return Ok(()),
            Encoding::Sllz(version) => version,
        };

        let plain = current.bytes.clone();
        let wrapped = sllz::wrap(version, endian, &plain)?;
        if force || wrapped.len() < plain.len() {
            self.data_history.add(wrapped, true);
        } else if !suppress_warnings {
            log::warn!(
                "encoding {:?} expanded the payload ({} -> {} bytes); keeping plaintext",
                self.name,
                plain.len(),
                wrapped.len()
            );
        }
        Ok(())
    }

    /// Places this file's payload at the end of `writer`, respecting
    /// `align`, then backpatches the 0x20-byte header at the position the
    /// stream was at on entry. `encoding`, when given, is applied first.
    pub(crate) fn to_archive_entry(
        &mut self,
        writer: &mut Writer,
        align: u64,
        endian: Endian,
        encoding: Option<Encoding>,
        suppress_warnings: bool,
    ) -> Result<()> {
        if let Some(encoding) = encoding {
            self.encode(encoding, endian, false, suppress_warnings)?;
        }

        let (payload, is_compressed) = {
            let current = self.data_history.current().ok_or(Error::DataNotLoaded)?;
            (current.bytes.clone(), current.is_compressed)
        };

        writer.push_forward_to_end();

        let pos = writer.stream_position() as u64;
        let remainder = pos % align;
        let space_before_boundary = if remainder == 0 { 0 } else { align - remainder };
        if space_before_boundary <= payload.len() as u64 {
            writer.pad_to(align as usize);
        }

        let data_offset = writer.stream_position() as u64;
        writer.write_bytes(&payload)?;
        writer.pop_back();

        self.data_offset = data_offset;
        self.orig_compressed = is_compressed;
        #[allow(clippy::cast_possible_truncation)]
        let entry_length = payload.len() as u32;
        self.entry_length = entry_length;

        let (low32, high24) = split_offset(data_offset);
        let comp_flag: u32 = if is_compressed { COMPRESSED_FLAG } else { 0 };
        #[allow(clippy::cast_sign_loss)]
        let size_field = self.size as u32;

        writer.write(&comp_flag, endian)?;
        writer.write(&size_field, endian)?;
        writer.write(&entry_length, endian)?;
        writer.write(&low32, endian)?;
        writer.write(&self.attributes.bits(), endian)?;
        writer.write(&high24, endian)?;
        writer.write(&self.timestamp, endian)?;

        Ok(())
    }

    pub(crate) fn read_header(reader: &mut Reader<'_>, endian: Endian) -> Result<Self> {
        let comp_flag: u32 = reader.read(endian)?;
        let size: i32 = reader.read(endian)?;
        let entry_length: u32 = reader.read(endian)?;
        let low32: u32 = reader.read(endian)?;
        let attributes: u32 = reader.read(endian)?;
        let high24: u32 = reader.read(endian)?;
        let timestamp: u64 = reader.read(endian)?;

        Ok(Self {
            name: BString::from(""),
            orig_compressed: comp_flag & COMPRESSED_FLAG != 0,
            was_compressed: false,
            size,
            entry_length,
            attributes: Attributes::from_bits_opaque(attributes),
            timestamp,
            data_offset: join_offset(low32, high24),
            containing_directory: None,
            data_history: History::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{join_offset, split_offset, File};

    #[test]
    fn offset_split_round_trips_small_values() {
        let offset = 0x0000_1234_5678u64;
        let (low, high) = split_offset(offset);
        assert_eq!(join_offset(low, high), offset);
    }

    #[test]
    fn offset_split_uses_sentinel_past_32_bits() {
        let offset = (0x12u64 << 32) | 0xFFFF_FFFFu64;
        let (low, high) = split_offset(offset);
        assert_eq!(low, u32::MAX);
        assert_eq!(high, 0x12);
        assert_eq!(join_offset(low, high), offset);
    }

    #[test]
    fn decode_of_plaintext_payload_is_a_no_op() {
        let mut file = File::default();
        file.data_history.add(b"plain".to_vec(), false);
        file.decode(false).unwrap();
        assert_eq!(file.data().unwrap(), b"plain");
    }
}
