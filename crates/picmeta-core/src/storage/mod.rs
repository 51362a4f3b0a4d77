//! Where media comes from and where it goes: the local filesystem or a
//! host reached over ssh.

pub mod local;
pub mod remote;

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::media;

pub use local::LocalFs;
pub use remote::SshRemote;

/// A file readable on the local filesystem for as long as this value lives.
/// Remote files are fetched into a temporary file that is removed on drop.
#[derive(Debug)]
pub enum LocalFile {
    Borrowed(PathBuf),
    Temp(tempfile::TempPath),
}

impl LocalFile {
    pub fn path(&self) -> &Path {
        match self {
            LocalFile::Borrowed(p) => p,
            LocalFile::Temp(p) => p,
        }
    }
}

/// Source side: listing and reading media.
pub trait MediaSource: Send + Sync {
    /// Every regular file below `root`, unfiltered.
    fn list_files(&self, root: &str) -> Result<Vec<String>>;

    /// Make `path` readable locally.
    fn fetch(&self, path: &str) -> Result<LocalFile>;
}

/// Destination side: existence checks, transfers and in-place edits.
pub trait Destination: Send + Sync {
    fn exists(&self, path: &Path) -> Result<bool>;

    /// Copy the local file `src` to `dest`, creating parent directories.
    /// Returns only once the data has been flushed.
    fn transfer(&self, src: &Path, dest: &Path) -> Result<()>;

    /// Run `edit` against a local view of `dest` and persist the result.
    fn edit_in_place(&self, dest: &Path, edit: &mut dyn FnMut(&Path) -> Result<()>) -> Result<()>;
}

/// Media files below `root`, minus vendor metadata directories and
/// unrecognized extensions.
pub fn list_media_files(source: &dyn MediaSource, root: &str) -> Result<Vec<String>> {
    let files = source.list_files(root)?;
    Ok(files
        .into_iter()
        .filter(|p| !media::is_vendor_metadata(p) && media::is_media_file(p))
        .collect())
}

/// POSIX single-quote escaping for remote shell commands.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}
