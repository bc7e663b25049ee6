use std::io;

/// Every fatal failure mode the crate can produce. Warnings (redundant
/// encode/decode requests, expansion that was rejected without `force`)
/// are not represented here — they are logged and, where the caller asked
/// for them, collected separately. See [`crate::config`].
#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("expected a PARC header but found magic bytes {0:08X}")]
    BadMagic(u32),

    #[error("expected an SLLZ header but found magic bytes {0:08X}")]
    BadSllzMagic(u32),

    #[error("unsupported SLLZ version: {0}")]
    BadSllzVersion(u8),

    #[error("archive declares a size of {declared} bytes but the stream only holds {actual}")]
    TruncatedArchive { declared: u64, actual: u64 },

    #[error("file is too large to be stored in a PARC archive ({0} bytes, limit is 2 GiB)")]
    SizeOverflow(u64),

    #[error("operation requires the file's data to be loaded first")]
    DataNotLoaded,

    #[error("archive is missing one of its initialization passes and can not be emitted")]
    NotReadyToEmit,

    #[error("SLLZ v1 encoder output exceeded its allocated buffer")]
    ExpansionOverflow,

    #[error("SLLZ v2 input is too small to be chunk-framed ({0} bytes, minimum is 27)")]
    TooSmallForSllzV2(usize),

    #[error("path not found: {0}")]
    NotFound(std::path::PathBuf),

    #[error("manifest is malformed: {0}")]
    MalformedManifest(&'static str),

    #[error("manifest declared {declared} entries under {scope} but {actual} were read")]
    ManifestCountMismatch {
        scope: &'static str,
        declared: u32,
        actual: u32,
    },

    #[error("more than 1000 automatic backup slots were requested")]
    CountTooHigh,

    #[error("archives are not similar enough to flash: endianness, extension flags, counts, or names differ")]
    NotSimilar,

    #[error("decompression produced {actual} bytes, expected {expected}")]
    DecompressionSizeMismatch { expected: usize, actual: usize },

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = core::result::Result<T, Error>;
