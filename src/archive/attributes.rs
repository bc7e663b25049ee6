//! The attribute bitmap carried by every directory and file entry. The
//! source treats this as an opaque 32-bit field it never interprets beyond
//! a single well-known bit, so unknown bits must survive a parse/emit
//! round trip untouched.

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct Attributes: u32 {
        const DIRECTORY = 0x0000_0001;
        const READ_ONLY = 0x0000_0002;
        const HIDDEN = 0x0000_0004;
        const SYSTEM = 0x0000_0008;
        const ARCHIVE = 0x0000_0010;
        const COMPRESSED = 0x0000_0020;
    }
}

impl Attributes {
    #[must_use]
    pub(crate) fn from_bits_opaque(bits: u32) -> Self {
        Self::from_bits_retain(bits)
    }
}
