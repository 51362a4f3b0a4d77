use std::path::Path;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "tiff", "tif", "heic", "heif"];
const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mov", "avi", "mkv", "m4v", "3gp", "wmv", "flv", "webm", "mpg", "mpeg", "mts", "m2ts",
];

/// Synology thumbnail/index directories.
pub const VENDOR_METADATA_DIR: &str = "@eaDir";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Classify by extension (case-insensitive); `None` for non-media.
    pub fn from_path(path: &str) -> Option<Self> {
        let ext = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Image)
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Video)
        } else {
            None
        }
    }
}

pub fn is_media_file(path: &str) -> bool {
    MediaKind::from_path(path).is_some()
}

pub fn is_vendor_metadata(path: &str) -> bool {
    path.contains(VENDOR_METADATA_DIR)
}

/// One media item to process, local or remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidatePath {
    /// Path as listed by the source (local or remote)
    pub path: String,
    /// Extension including its leading dot, as written in the filename
    pub ext: String,
    /// Position in the natural-sorted input sequence
    pub index: usize,
}

impl CandidatePath {
    /// Returns `None` for paths that are not recognized media.
    pub fn new(path: impl Into<String>, index: usize) -> Option<Self> {
        let path = path.into();
        MediaKind::from_path(&path)?;
        let ext = extension_of(&path).to_string();
        Some(Self { path, ext, index })
    }

    /// Final path component.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// File name without its extension.
    pub fn stem(&self) -> &str {
        let name = self.file_name();
        name.strip_suffix(self.ext.as_str()).unwrap_or(name)
    }
}

/// Extension of the final path component including the dot, or `""`.
pub fn extension_of(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rfind('.') {
        Some(i) if i > 0 => &name[i..],
        _ => "",
    }
}
