use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("could not parse date from filename: {0}")]
    UnparseableDate(String),

    #[error("transfer failed for {path}: {reason}")]
    Transfer { path: String, reason: String },

    #[error("metadata update failed for {path}: {reason}")]
    MetadataWrite { path: String, reason: String },

    #[error("cannot list {root}: {reason}")]
    Enumeration { root: String, reason: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("remote command failed: {0}")]
    Remote(String),

    #[error("exiftool error: {0}")]
    ExifTool(String),
}

impl Error {
    /// Only enumeration and configuration failures abort a run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Enumeration { .. } | Error::Configuration(_))
    }

    pub(crate) fn transfer(path: impl AsRef<std::path::Path>, reason: impl ToString) -> Self {
        Error::Transfer {
            path: path.as_ref().display().to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn metadata_write(path: impl AsRef<std::path::Path>, reason: impl ToString) -> Self {
        Error::MetadataWrite {
            path: path.as_ref().display().to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
