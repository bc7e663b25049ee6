//! Flashing: overwriting one archive's metadata (and, selectively, its
//! payload encoding state) from another structurally-identical archive
//! without touching either one's directory/file structure. See spec
//! §4.11.

use crate::archive::{Archive, Encoding};
use crate::config::Options;
use crate::error::{Error, Result};

/// Copies `source`'s platform/`unknown_a`, every directory's attributes,
/// and every file's attributes/timestamp onto `target`, re-encoding or
/// decoding a target file only when `source`'s matching file carries a
/// different compression state. Fails if the two archives are not
/// [`Archive::similar_to`] each other.
pub fn flash(target: &mut Archive, source: &Archive, options: &Options) -> Result<()> {
    if !target.similar_to(source) {
        return Err(Error::NotSimilar);
    }

    target.platform = source.platform;
    target.unknown_a = source.unknown_a;

    for (dst, src) in target.directories_mut().iter_mut().zip(source.directories()) {
        dst.attributes = src.attributes;
    }

    let endianness = target.endianness;
    let suppress_warnings = options.suppress_warnings;
    for (dst, src) in target.files_mut().iter_mut().zip(source.files()) {
        dst.attributes = src.attributes;
        dst.timestamp = src.timestamp;

        let src_compressed = src.is_compressed();
        let dst_compressed = dst.is_compressed();
        if src_compressed && !dst_compressed {
            dst.encode(Encoding::Sllz(crate::sllz::Version::V1), endianness, true, suppress_warnings)?;
        } else if !src_compressed && dst_compressed {
            dst.decode(suppress_warnings)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::flash;
    use crate::archive::Archive;
    use crate::config::Options;

    fn empty_archive_bytes() -> Vec<u8> {
        let mut bytes = vec![0u8; 0x800];
        bytes[0..4].copy_from_slice(b"PARC");
        bytes[5] = 0; // little-endian
        bytes[20..24].copy_from_slice(&0x20u32.to_le_bytes());
        bytes[28..32].copy_from_slice(&0x20u32.to_le_bytes());
        bytes
    }

    #[test]
    fn flash_accepts_two_structurally_identical_empty_archives() {
        let mut target = Archive::parse(&empty_archive_bytes(), false).unwrap();
        let source = Archive::parse(&empty_archive_bytes(), false).unwrap();
        assert!(flash(&mut target, &source, &Options::default()).is_ok());
    }
}
