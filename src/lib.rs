#![warn(
    clippy::pedantic,
    clippy::single_char_lifetime_names,
    clippy::std_instead_of_core
)]
#![allow(clippy::enum_glob_use, clippy::missing_errors_doc)]

mod cc;
pub mod archive;
pub mod config;
pub mod error;
mod flash;
pub mod manifest;
mod io;
pub mod sllz;

pub use archive::Archive;
pub use error::{Error, Result};
pub use flash::flash;

pub use bstr::{BStr, BString};

pub mod prelude {
    pub use crate::archive::{Archive, Directory, Encoding, File};
    pub use crate::config::Options;
    pub use crate::error::{Error, Result};
}
