//! Process-wide-looking configuration, modeled as an explicit, immutable
//! value plumbed through every operation rather than a global mutable
//! singleton (see spec §5, §9: "Global mutable options").
//!
//! [`global`] exists only as a thin compatibility adapter for callers that
//! want the old set-it-once-and-forget-it surface; the core archive and
//! SLLZ operations never read it themselves.

/// How the on-disk size field in the PARC header behaves when the archive
/// is emitted. Mirrors `file_size_mode` from the archive data model (§3.1).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum FileSizeMode {
    /// Backpatch the header with the true stream length.
    #[default]
    WriteSize = 1,
    /// Leave the size field at zero.
    DontWriteSize = 2,
}

impl FileSizeMode {
    #[must_use]
    pub(crate) fn as_u16(self) -> u16 {
        self as u16
    }
}

#[non_exhaustive]
#[derive(Clone, Copy, Debug)]
pub struct Options {
    pub verbose: bool,
    pub suppress_warnings: bool,
    pub file_size_mode: FileSizeMode,
    /// The source's `WriteAligned` variant: round the persisted size up
    /// to `file_alignment` instead of writing the exact stream length.
    pub write_aligned: bool,
    pub file_alignment: u64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            verbose: false,
            suppress_warnings: false,
            file_size_mode: FileSizeMode::WriteSize,
            write_aligned: false,
            file_alignment: 0x800,
        }
    }
}

impl Options {
    #[must_use]
    pub fn builder() -> OptionsBuilder {
        OptionsBuilder::new()
    }
}

#[derive(Clone, Copy, Debug, Default)]
#[repr(transparent)]
pub struct OptionsBuilder(Options);

impl OptionsBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self(Options::default())
    }

    #[must_use]
    pub fn build(self) -> Options {
        self.0
    }

    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.0.verbose = verbose;
        self
    }

    #[must_use]
    pub fn suppress_warnings(mut self, suppress_warnings: bool) -> Self {
        self.0.suppress_warnings = suppress_warnings;
        self
    }

    #[must_use]
    pub fn file_size_mode(mut self, mode: FileSizeMode) -> Self {
        self.0.file_size_mode = mode;
        self
    }

    #[must_use]
    pub fn write_aligned(mut self, write_aligned: bool) -> Self {
        self.0.write_aligned = write_aligned;
        self
    }

    #[must_use]
    pub fn file_alignment(mut self, file_alignment: u64) -> Self {
        self.0.file_alignment = file_alignment;
        self
    }
}

/// Thin adapter over a single global [`Options`] value, for callers
/// migrating from the source's global setter surface. Prefer threading an
/// `&Options` explicitly; nothing in `archive` or `sllz` consults this.
pub mod global {
    use super::Options;
    use std::sync::OnceLock;

    static OPTIONS: OnceLock<Options> = OnceLock::new();

    /// Sets the process-wide default. Only the first call takes effect,
    /// matching the "set before any archive operation, left stable
    /// thereafter" contract from spec §5.
    pub fn set_options(options: Options) {
        let _ = OPTIONS.set(options);
    }

    #[must_use]
    pub fn options() -> Options {
        OPTIONS.get().copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::{FileSizeMode, Options};

    #[test]
    fn builder_overrides_defaults() {
        let options = Options::builder()
            .verbose(true)
            .file_size_mode(FileSizeMode::DontWriteSize)
            .file_alignment(0x1000)
            .build();
        assert!(options.verbose);
        assert_eq!(options.file_size_mode, FileSizeMode::DontWriteSize);
        assert_eq!(options.file_alignment, 0x1000);
    }

    #[test]
    fn default_state() {
        let options = Options::default();
        assert!(!options.verbose);
        assert_eq!(options.file_size_mode, FileSizeMode::WriteSize);
        assert_eq!(options.file_alignment, 0x800);
    }
}
