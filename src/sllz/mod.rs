//! SLLZ container framing: a fixed 16-byte header wrapping either the v1
//! LZSS stream or the v2 chunked DEFLATE stream. See spec §4.2.

mod v1;
mod v2;

use crate::cc::make_four;
use crate::error::{Error, Result};
use crate::io::{Endian, Reader, Writer};

const MAGIC: u32 = make_four(b"SLLZ");
const DATA_OFFSET: u32 = 0x10;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum Version {
    V1 = 1,
    V2 = 2,
}

impl Version {
    fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            1 => Ok(Self::V1),
            2 => Ok(Self::V2),
            other => Err(Error::BadSllzVersion(other)),
        }
    }
}

struct Header {
    endian: Endian,
    version: Version,
    decompressed_size: u32,
    total_size: u32,
}

impl Header {
    fn read(reader: &mut Reader<'_>) -> Result<Self> {
        let magic: u32 = reader.read::<u32>(Endian::Little)?;
        if magic != MAGIC {
            return Err(Error::BadSllzMagic(magic));
        }
        let endian_tag: u8 = reader.read(Endian::Little)?;
        let endian = Endian::from_tag(endian_tag);
        let version_tag: u8 = reader.read(Endian::Little)?;
        let version = Version::from_tag(version_tag)?;
        let _reserved: u16 = reader.read(Endian::Little)?;
        let decompressed_size: u32 = reader.read(endian)?;
        let total_size: u32 = reader.read(endian)?;
        Ok(Self {
            endian,
            version,
            decompressed_size,
            total_size,
        })
    }

    fn write(&self, writer: &mut Writer) -> Result<()> {
        writer.write(&MAGIC, Endian::Little)?;
        writer.write(&self.endian.tag(), Endian::Little)?;
        writer.write(&(self.version as u8), Endian::Little)?;
        writer.write(&0u16, Endian::Little)?;
        writer.write(&self.decompressed_size, self.endian)?;
        writer.write(&self.total_size, self.endian)?;
        Ok(())
    }
}

/// Wraps `data` in an SLLZ container of the given version.
pub fn wrap(version: Version, endian: Endian, data: &[u8]) -> Result<Vec<u8>> {
    let payload = match version {
        Version::V1 => v1::encode(data)?,
        Version::V2 => v2::encode(data)?,
    };

    #[allow(clippy::cast_possible_truncation)]
    let decompressed_size = data.len() as u32;
    let total_size = DATA_OFFSET
        .checked_add(payload.len() as u32)
        .ok_or(Error::SizeOverflow(data.len() as u64))?;

    let header = Header {
        endian,
        version,
        decompressed_size,
        total_size,
    };

    let mut writer = Writer::new();
    header.write(&mut writer)?;
    writer.write_bytes(&payload)?;
    Ok(writer.into_bytes())
}

/// Unwraps an SLLZ container, returning the decompressed payload.
///
/// A `decompressed_size` that disagrees with what the inner codec actually
/// produces is not treated as fatal: the source self-heals by trusting the
/// freshly decoded length and logging a warning (unless `suppress_warnings`
/// is set), and this preserves that behavior rather than rejecting the
/// archive.
pub fn unwrap(data: &[u8], suppress_warnings: bool) -> Result<Vec<u8>> {
    let mut reader = Reader::new(data);
    let header = Header::read(&mut reader)?;

    if (header.total_size as usize) > data.len() {
        return Err(Error::TruncatedArchive {
            declared: u64::from(header.total_size),
            actual: data.len() as u64,
        });
    }

    let payload = reader.read_bytes(data.len() - DATA_OFFSET as usize)?;
    let declared_size = header.decompressed_size as usize;

    let decoded = match header.version {
        Version::V1 => v1::decode(payload, declared_size)?,
        Version::V2 => v2::decode(payload, declared_size)?,
    };

    if decoded.len() != declared_size && !suppress_warnings {
        log::warn!(
            "SLLZ header declared {} decompressed bytes but decoding produced {}; trusting the decoded length",
            declared_size,
            decoded.len()
        );
    }

    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::{unwrap, wrap, Version};
    use crate::io::Endian;

    #[test]
    fn v1_round_trips_through_container() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(4);
        let wrapped = wrap(Version::V1, Endian::Little, &data).unwrap();
        assert_eq!(&wrapped[0..4], b"SLLZ");
        let unwrapped = unwrap(&wrapped, false).unwrap();
        assert_eq!(unwrapped, data);
    }

    #[test]
    fn v2_round_trips_through_container() {
        let data = vec![b'q'; 40_000];
        let wrapped = wrap(Version::V2, Endian::Big, &data).unwrap();
        let unwrapped = unwrap(&wrapped, false).unwrap();
        assert_eq!(unwrapped, data);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut wrapped = wrap(Version::V1, Endian::Little, b"hello world").unwrap();
        wrapped[0] = b'X';
        assert!(unwrap(&wrapped, false).is_err());
    }
}
