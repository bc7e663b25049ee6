//! The top-level PARC container: binary parse/emit and the tree↔flat
//! conversion used both when reading an archive back out and when
//! importing a real filesystem directory. See spec §3.1, §4.7–§4.9.

pub mod attributes;
pub mod directory;
pub mod file;
mod history;

pub use attributes::Attributes;
pub use directory::Directory;
pub use file::{Encoding, File};

use crate::cc::make_four;
use crate::config::{FileSizeMode, Options};
use crate::error::{Error, Result};
pub use crate::io::Endian;
use crate::io::{Reader, Writer};
use bstr::BString;
use rayon::prelude::*;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

const MAGIC: u32 = make_four(b"PARC");
const HEADER_SIZE: u64 = 0x20;
const NAME_ENTRY_SIZE: u64 = 0x40;
const FINAL_PADDING: usize = 0x800;

/// Where the archive's conceptual root lives: an explicit entry already
/// present in `directories[]`, or one synthesized to aggregate top-level
/// entries that never declared a root of their own.
#[derive(Clone, Debug)]
pub(crate) enum RootDirectory {
    Existing(usize),
    Synthesized(Directory),
}

#[derive(Clone, Debug)]
pub struct Archive {
    pub name: String,
    pub platform: u8,
    pub endianness: Endian,
    pub size_extended: bool,
    pub relocated: bool,
    pub file_size_mode: FileSizeMode,
    pub unknown_a: u16,
    pub(crate) directories: Vec<Directory>,
    pub(crate) files: Vec<File>,
    pub(crate) root_directory: RootDirectory,

    archive_initialized: bool,
    file_tree_initialized: bool,
    data_loaded: bool,
}

impl Archive {
    #[must_use]
    pub fn dir_count(&self) -> u32 {
        #[allow(clippy::cast_possible_truncation)]
        let n = self.directories.len() as u32;
        n
    }

    #[must_use]
    pub fn file_count(&self) -> u32 {
        #[allow(clippy::cast_possible_truncation)]
        let n = self.files.len() as u32;
        n
    }

    #[must_use]
    pub fn directories(&self) -> &[Directory] {
        &self.directories
    }

    #[must_use]
    pub fn files(&self) -> &[File] {
        &self.files
    }

    #[must_use]
    pub fn files_mut(&mut self) -> &mut [File] {
        &mut self.files
    }

    #[must_use]
    pub fn directories_mut(&mut self) -> &mut [Directory] {
        &mut self.directories
    }

    #[must_use]
    pub fn root(&self) -> &Directory {
        match &self.root_directory {
            RootDirectory::Existing(idx) => &self.directories[*idx],
            RootDirectory::Synthesized(dir) => dir,
        }
    }

    #[must_use]
    pub fn is_ready_to_emit(&self) -> bool {
        self.archive_initialized && self.file_tree_initialized && self.data_loaded
    }

    // ---- parse ----------------------------------------------------------

    pub fn parse(bytes: &[u8], load_all_data: bool) -> Result<Self> {
        let mut reader = Reader::new(bytes);

        let magic: u32 = reader.read(Endian::Little)?;
        if magic != MAGIC {
            return Err(Error::BadMagic(magic));
        }

        let platform: u8 = reader.read(Endian::Little)?;
        let endian_tag: u8 = reader.read(Endian::Little)?;
        let endianness = Endian::from_tag(endian_tag);
        let size_extended: u8 = reader.read(endianness)?;
        let relocated: u8 = reader.read(endianness)?;
        let file_size_mode_tag: u16 = reader.read(endianness)?;
        let unknown_a: u16 = reader.read(endianness)?;
        let total_size: u32 = reader.read(endianness)?;
        let dir_count: u32 = reader.read(endianness)?;
        let dir_table_offset: u32 = reader.read(endianness)?;
        let file_count: u32 = reader.read(endianness)?;
        let file_table_offset: u32 = reader.read(endianness)?;

        let file_size_mode = if file_size_mode_tag == 2 {
            FileSizeMode::DontWriteSize
        } else {
            FileSizeMode::WriteSize
        };

        if matches!(file_size_mode, FileSizeMode::WriteSize) && u64::from(total_size) > bytes.len() as u64 {
            return Err(Error::TruncatedArchive {
                declared: u64::from(total_size),
                actual: bytes.len() as u64,
            });
        }

        let mut names = Vec::with_capacity((dir_count + file_count) as usize);
        for _ in 0..(dir_count + file_count) {
            let raw = reader.read_bytes(NAME_ENTRY_SIZE as usize)?;
            let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
            names.push(BString::from(&raw[..end]));
        }
        let (dir_names, file_names) = names.split_at(dir_count as usize);

        let mut directories = Vec::with_capacity(dir_count as usize);
        for i in 0..dir_count {
            reader.seek_absolute(dir_table_offset as usize + (i as usize) * 0x20)?;
            let mut dir = Directory::read_header(&mut reader, endianness)?;
            dir.name = dir_names[i as usize].clone();
            directories.push(dir);
        }

        let mut files = Vec::with_capacity(file_count as usize);
        for i in 0..file_count {
            reader.seek_absolute(file_table_offset as usize + (i as usize) * 0x20)?;
            let mut file = File::read_header(&mut reader, endianness)?;
            file.name = file_names[i as usize].clone();
            if load_all_data {
                file.load_data(&mut reader, Some(file.data_offset))?;
            }
            files.push(file);
        }

        let mut archive = Self {
            name: String::new(),
            platform,
            endianness,
            size_extended: size_extended != 0,
            relocated: relocated != 0,
            file_size_mode,
            unknown_a,
            directories,
            files,
            root_directory: RootDirectory::Synthesized(Directory::default()),
            archive_initialized: true,
            file_tree_initialized: false,
            data_loaded: load_all_data,
        };
        archive.build_tree();
        Ok(archive)
    }

    /// Resolves `subdirectories`/`files` index views for every directory
    /// from its flat slice, sets each file's `containing_directory`
    /// back-pointer, and locates (or synthesizes) the root.
    fn build_tree(&mut self) {
        for dir_idx in 0..self.directories.len() {
            let (first_dir, dir_count, first_file, file_count) = {
                let dir = &self.directories[dir_idx];
                (dir.first_dir_index, dir.dir_count, dir.first_file_index, dir.file_count)
            };
            let subdirectories = (first_dir..first_dir + dir_count).map(|i| i as usize).collect::<Vec<_>>();
            let file_indices = (first_file..first_file + file_count).map(|i| i as usize).collect::<Vec<_>>();
            for &fi in &file_indices {
                if let Some(file) = self.files.get_mut(fi) {
                    file.containing_directory = Some(dir_idx);
                }
            }
            let dir = &mut self.directories[dir_idx];
            dir.subdirectories = subdirectories;
            dir.files = file_indices;
        }

        if let Some(root_idx) = self.directories.iter().position(Directory::is_root) {
            self.root_directory = RootDirectory::Existing(root_idx);
        } else {
            self.root_directory = RootDirectory::Synthesized(self.synthesize_root());
        }

        self.file_tree_initialized = true;
    }

    fn synthesize_root(&self) -> Directory {
        let mut top_level_dirs = Vec::new();
        let mut idx = 0u32;
        while idx < self.dir_count() {
            top_level_dirs.push(idx as usize);
            idx += self.directories[idx as usize].dir_count + 1;
        }

        let mut covered = vec![false; self.files.len()];
        for dir in &self.directories {
            for &fi in &dir.files {
                if let Some(slot) = covered.get_mut(fi) {
                    *slot = true;
                }
            }
        }
        let unaccounted_files = covered
            .iter()
            .enumerate()
            .filter(|(_, &covered)| !covered)
            .map(|(i, _)| i)
            .collect::<Vec<_>>();

        Directory {
            name: BString::from(""),
            dir_count: top_level_dirs.len() as u32,
            first_dir_index: 0,
            file_count: unaccounted_files.len() as u32,
            first_file_index: 0,
            attributes: Attributes::DIRECTORY,
            subdirectories: top_level_dirs,
            files: unaccounted_files,
        }
    }

    // ---- emit -------------------------------------------------------------

    pub fn emit(&mut self, options: &Options) -> Result<Vec<u8>> {
        if !self.is_ready_to_emit() {
            return Err(Error::NotReadyToEmit);
        }

        let dir_count = self.dir_count();
        let file_count = self.file_count();
        let align = options.file_alignment.max(1);

        let dir_table_offset = HEADER_SIZE + u64::from(dir_count + file_count) * NAME_ENTRY_SIZE;
        let file_table_offset = dir_table_offset + u64::from(dir_count) * directory::HEADER_SIZE;
        let end_of_headers = file_table_offset + u64::from(file_count) * file::HEADER_SIZE;
        let end_of_headers_aligned = align_up(end_of_headers, align);

        let mut writer = Writer::new();
        writer.reserve_zeroed(end_of_headers_aligned as usize);

        writer.seek_absolute(0);
        self.write_header(&mut writer, dir_table_offset, file_table_offset)?;

        writer.seek_absolute(HEADER_SIZE as usize);
        self.write_name_tables(&mut writer)?;

        writer.seek_absolute(dir_table_offset as usize);
        for dir in &self.directories {
            dir.write_header(&mut writer, self.endianness)?;
        }

        for i in 0..self.files.len() {
            writer.seek_absolute(file_table_offset as usize + i * 0x20);
            self.files[i].to_archive_entry(&mut writer, align, self.endianness, None, options.suppress_warnings)?;
        }

        if matches!(self.file_size_mode, FileSizeMode::WriteSize) {
            let mut total = writer.len() as u64;
            if options.write_aligned {
                total = align_up(total, align);
            }
            #[allow(clippy::cast_possible_truncation)]
            let total_field = total as u32;
            writer.seek_absolute(12);
            writer.write(&total_field, self.endianness)?;
        }

        writer.seek_absolute(writer.len());
        writer.pad_to(FINAL_PADDING);

        Ok(writer.into_bytes())
    }

    fn write_header(&self, writer: &mut Writer, dir_table_offset: u64, file_table_offset: u64) -> Result<()> {
        writer.write(&MAGIC, Endian::Little)?;
        writer.write(&self.platform, Endian::Little)?;
        writer.write(&self.endianness.tag(), Endian::Little)?;
        writer.write(&u8::from(self.size_extended), self.endianness)?;
        writer.write(&u8::from(self.relocated), self.endianness)?;
        writer.write(&self.file_size_mode.as_u16(), self.endianness)?;
        writer.write(&self.unknown_a, self.endianness)?;
        writer.write(&0u32, self.endianness)?; // backpatched once the full length is known, if WriteSize
        writer.write(&self.dir_count(), self.endianness)?;
        #[allow(clippy::cast_possible_truncation)]
        writer.write(&(dir_table_offset as u32), self.endianness)?;
        writer.write(&self.file_count(), self.endianness)?;
        #[allow(clippy::cast_possible_truncation)]
        writer.write(&(file_table_offset as u32), self.endianness)?;
        Ok(())
    }

    fn write_name_tables(&self, writer: &mut Writer) -> Result<()> {
        for dir in &self.directories {
            write_padded_name(writer, &dir.name)?;
        }
        for file in &self.files {
            write_padded_name(writer, &file.name)?;
        }
        Ok(())
    }

    // ---- bulk codec ---------------------------------------------------

    pub fn decode_all(&mut self, options: &Options) -> Result<()> {
        let suppress_warnings = options.suppress_warnings;
        self.files.par_iter_mut().try_for_each(|file| file.decode(suppress_warnings))
    }

    pub fn encode_all(&mut self, encoding: Encoding, options: &Options) -> Result<()> {
        let endian = self.endianness;
        let suppress_warnings = options.suppress_warnings;
        self.files
            .par_iter_mut()
            .try_for_each(|file| file.encode(encoding, endian, false, suppress_warnings))
    }

    pub fn mark_data_loaded(&mut self) {
        self.data_loaded = true;
    }

    // ---- flashing precondition ------------------------------------------

    #[must_use]
    pub fn similar_to(&self, other: &Self) -> bool {
        if self.endianness != other.endianness
            || self.size_extended != other.size_extended
            || self.relocated != other.relocated
            || self.dir_count() != other.dir_count()
            || self.file_count() != other.file_count()
        {
            return false;
        }
        self.directories.iter().zip(&other.directories).all(|(a, b)| a.name == b.name)
            && self.files.iter().zip(&other.files).all(|(a, b)| a.name == b.name)
    }
}

fn align_up(value: u64, align: u64) -> u64 {
    if align <= 1 {
        return value;
    }
    let remainder = value % align;
    if remainder == 0 {
        value
    } else {
        value + (align - remainder)
    }
}

fn write_padded_name(writer: &mut Writer, name: &BString) -> Result<()> {
    let mut buf = [0u8; NAME_ENTRY_SIZE as usize];
    let len = name.len().min(buf.len());
    buf[..len].copy_from_slice(&name[..len]);
    writer.write_bytes(&buf)?;
    Ok(())
}

/// Builds an archive from a real filesystem directory, threading the base
/// path explicitly through the recursion rather than mutating the process
/// working directory (see spec §4.9, §5, §9).
pub fn from_directory(root: &Path, options: &Options) -> Result<Archive> {
    if !root.is_dir() {
        return Err(Error::NotFound(root.to_path_buf()));
    }

    let mut directories = Vec::new();
    let mut files = Vec::new();
    let root_name = root
        .file_name()
        .map(|n| BString::from(n.as_encoded_bytes()))
        .unwrap_or_default();

    let (root_idx, root_subdirs) = push_directory(root, root_name, &mut directories, &mut files)?;

    let mut queue = VecDeque::new();
    queue.push_back((root_idx, root_subdirs));
    while let Some((idx, subdir_paths)) = queue.pop_front() {
        let mut child_indices = Vec::new();
        for path in subdir_paths {
            let child_name = path
                .file_name()
                .map(|n| BString::from(n.as_encoded_bytes()))
                .unwrap_or_default();
            let (child_idx, child_subdirs) = push_directory(&path, child_name, &mut directories, &mut files)?;
            child_indices.push(child_idx);
            queue.push_back((child_idx, child_subdirs));
        }

        #[allow(clippy::cast_possible_truncation)]
        {
            let dir = &mut directories[idx];
            dir.dir_count = child_indices.len() as u32;
            dir.first_dir_index = child_indices.first().copied().unwrap_or(0) as u32;
            dir.subdirectories = child_indices;
        }
    }

    // Leaf directories (dir_count == 0) get the sentinel `first_dir_index ==
    // archive.dir_count`, which is only known once every directory across
    // the whole tree has been appended — so this has to be a final pass,
    // not something assigned while a leaf's own entry is still being built.
    #[allow(clippy::cast_possible_truncation)]
    let final_dir_count = directories.len() as u32;
    for dir in &mut directories {
        if dir.dir_count == 0 {
            dir.first_dir_index = final_dir_count;
        }
    }

    let mut archive = Archive {
        name: String::new(),
        platform: 2,
        endianness: Endian::Little,
        size_extended: false,
        relocated: false,
        file_size_mode: options.file_size_mode,
        unknown_a: 1,
        directories,
        files,
        root_directory: RootDirectory::Existing(root_idx),
        archive_initialized: true,
        file_tree_initialized: false,
        data_loaded: true,
    };
    archive.build_tree();
    Ok(archive)
}

/// Reads one directory's own files and records its subdirectories without
/// descending into them, so a BFS driven by the caller appends each level's
/// directories together — `directories[]` ends up in level order, keeping
/// every directory's children contiguous regardless of how deep its
/// siblings' own subtrees go (see spec §4.9's level-by-level concatenation
/// note). `dir_count`/`first_dir_index`/`subdirectories` are filled in by
/// the caller once the child indices are known.
fn push_directory(path: &Path, name: BString, directories: &mut Vec<Directory>, files: &mut Vec<File>) -> Result<(usize, Vec<PathBuf>)> {
    let own_index = directories.len();

    let mut entries: Vec<_> = std::fs::read_dir(path)
        .map_err(Error::Io)?
        .collect::<std::io::Result<_>>()
        .map_err(Error::Io)?;
    entries.sort_by_key(std::fs::DirEntry::path);

    let first_file_index = files.len() as u32;
    let mut own_files = Vec::new();
    let mut subdir_paths = Vec::new();
    for entry in &entries {
        let metadata = entry.metadata().map_err(Error::Io)?;
        if metadata.is_file() {
            let file_index = files.len();
            let bytes = std::fs::read(entry.path()).map_err(Error::Io)?;
            #[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
            let size = bytes.len() as i32;
            let timestamp = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map_or(0, |d| d.as_secs());
            let mut file = File {
                name: BString::from(entry.file_name().as_encoded_bytes()),
                size,
                timestamp,
                containing_directory: Some(own_index),
                ..File::default()
            };
            file.data_history.add(bytes, false);
            files.push(file);
            own_files.push(file_index);
        } else if metadata.is_dir() {
            subdir_paths.push(entry.path());
        }
    }

    directories.push(Directory {
        name,
        dir_count: 0,
        first_dir_index: 0,
        file_count: own_files.len() as u32,
        first_file_index,
        attributes: Attributes::DIRECTORY,
        subdirectories: Vec::new(),
        files: own_files,
    });

    Ok((own_index, subdir_paths))
}

#[cfg(test)]
mod tests {
    use super::{from_directory, Archive};
    use crate::config::Options;

    #[test]
    fn empty_archive_emit_matches_concrete_scenario() {
        let mut archive = Archive {
            name: String::new(),
            platform: 2,
            endianness: super::Endian::Big,
            size_extended: false,
            relocated: false,
            file_size_mode: crate::config::FileSizeMode::WriteSize,
            unknown_a: 1,
            directories: Vec::new(),
            files: Vec::new(),
            root_directory: super::RootDirectory::Synthesized(super::Directory::default()),
            archive_initialized: true,
            file_tree_initialized: true,
            data_loaded: true,
        };

        let bytes = archive.emit(&Options::default()).unwrap();
        assert_eq!(bytes.len(), 0x800);
        assert_eq!(&bytes[0..4], b"PARC");
        assert_eq!(&bytes[16..20], &0u32.to_be_bytes());
        assert_eq!(&bytes[24..28], &0u32.to_be_bytes());
        assert_eq!(&bytes[20..24], &0x20u32.to_be_bytes());
        assert_eq!(&bytes[28..32], &0x20u32.to_be_bytes());
    }

    #[test]
    fn parse_after_emit_is_structurally_identical() {
        let mut archive = Archive {
            name: String::new(),
            platform: 2,
            endianness: super::Endian::Little,
            size_extended: false,
            relocated: false,
            file_size_mode: crate::config::FileSizeMode::WriteSize,
            unknown_a: 1,
            directories: Vec::new(),
            files: Vec::new(),
            root_directory: super::RootDirectory::Synthesized(super::Directory::default()),
            archive_initialized: true,
            file_tree_initialized: true,
            data_loaded: true,
        };
        let bytes = archive.emit(&Options::default()).unwrap();
        let reparsed = Archive::parse(&bytes, false).unwrap();
        assert_eq!(reparsed.dir_count(), 0);
        assert_eq!(reparsed.file_count(), 0);
    }

    #[test]
    fn from_directory_builds_a_readable_archive() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("hello.txt"), b"hello world").unwrap();
        let archive = from_directory(tmp.path(), &Options::default()).unwrap();
        assert_eq!(archive.file_count(), 1);
        assert_eq!(archive.files()[0].name, "hello.txt");
    }

    #[test]
    fn from_directory_keeps_a_nested_branch_from_swallowing_its_sibling() {
        // root/dirA/dirA1, root/dirB — dirA has a nested child, dirB doesn't.
        // A depth-first flat array would put dirA1 right after dirA, so
        // root's [first_dir_index, first_dir_index + dir_count) slice would
        // resolve to [dirA, dirA1] instead of [dirA, dirB].
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("dirA/dirA1")).unwrap();
        std::fs::create_dir_all(tmp.path().join("dirB")).unwrap();

        let archive = from_directory(tmp.path(), &Options::default()).unwrap();
        assert_eq!(archive.dir_count(), 3);

        let root = archive.root();
        assert_eq!(root.subdirectories.len(), 2);
        assert_eq!(archive.directories()[root.subdirectories[0]].name, "dirA");
        assert_eq!(archive.directories()[root.subdirectories[1]].name, "dirB");

        let dir_a_idx = root.subdirectories[0];
        let dir_a = &archive.directories()[dir_a_idx];
        assert_eq!(dir_a.subdirectories.len(), 1);
        assert_eq!(archive.directories()[dir_a.subdirectories[0]].name, "dirA1");

        let dir_b_idx = root.subdirectories[1];
        assert_eq!(archive.directories()[dir_b_idx].subdirectories.len(), 0);
        assert_eq!(archive.directories()[dir_b_idx].first_dir_index, archive.dir_count());
    }
}
