use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::{Destination, LocalFile, MediaSource};
use crate::error::{Error, Result};
use crate::media::VENDOR_METADATA_DIR;

/// The local filesystem, as a source and as a destination.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl MediaSource for LocalFs {
    fn list_files(&self, root: &str) -> Result<Vec<String>> {
        fs::metadata(root).map_err(|e| Error::Enumeration {
            root: root.to_string(),
            reason: e.to_string(),
        })?;

        let mut files = Vec::new();
        let walker = WalkDir::new(root)
            .into_iter()
            .filter_entry(|e| e.file_name() != VENDOR_METADATA_DIR);

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    log::warn!("Error accessing {}: {}", root, e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            match entry.path().to_str() {
                Some(p) => files.push(p.to_string()),
                None => log::warn!("Skipping non-UTF-8 path: {}", entry.path().display()),
            }
        }

        Ok(files)
    }

    fn fetch(&self, path: &str) -> Result<LocalFile> {
        Ok(LocalFile::Borrowed(PathBuf::from(path)))
    }
}

impl Destination for LocalFs {
    fn exists(&self, path: &Path) -> Result<bool> {
        Ok(path.try_exists()?)
    }

    fn transfer(&self, src: &Path, dest: &Path) -> Result<()> {
        if let Some(dir) = dest.parent() {
            fs::create_dir_all(dir).map_err(|e| Error::transfer(dest, e))?;
        }
        copy_file(src, dest).map_err(|e| Error::transfer(dest, e))
    }

    fn edit_in_place(&self, dest: &Path, edit: &mut dyn FnMut(&Path) -> Result<()>) -> Result<()> {
        edit(dest)
    }
}

/// Copy `src` to `dst` and sync before returning.
pub fn copy_file(src: &Path, dst: &Path) -> io::Result<()> {
    let mut reader = File::open(src)?;
    let mut writer = BufWriter::new(File::create(dst)?);
    io::copy(&mut reader, &mut writer)?;
    writer.flush()?;
    writer.get_ref().sync_all()
}
