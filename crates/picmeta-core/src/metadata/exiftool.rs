// exiftool invocation, natively or through the exiftool/exiftool container image

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::date::exif::parse_capture_datetime;
use crate::error::{Error, Result};

pub const DOCKER_IMAGE: &str = "exiftool/exiftool";

/// Date fields rewritten on every metadata update.
pub const WRITE_FIELDS: &[&str] = &["DateTimeOriginal", "CreateDate", "ModifyDate"];

/// Date fields consulted when reading, in priority order.
pub const READ_FIELDS: &[&str] = &["DateTimeOriginal", "CreateDate", "MediaCreateDate"];

/// How to find exiftool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExifToolMode {
    /// Native binary on PATH, then the container image
    #[default]
    Auto,
    Native,
    Docker,
    /// Never touch embedded metadata
    Off,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExifToolBackend {
    Native(PathBuf),
    Docker { image: String },
}

impl ExifToolBackend {
    /// Resolve the backend for `mode`, or `None` when nothing usable exists.
    pub fn detect(mode: ExifToolMode) -> Option<Self> {
        match mode {
            ExifToolMode::Off => None,
            ExifToolMode::Native => Self::native(),
            ExifToolMode::Docker => Self::docker(),
            ExifToolMode::Auto => Self::native().or_else(Self::docker),
        }
    }

    pub fn native() -> Option<Self> {
        which::which("exiftool").ok().map(ExifToolBackend::Native)
    }

    /// Use the container image, pulling it once if it is not present.
    pub fn docker() -> Option<Self> {
        which::which("docker").ok()?;

        if !docker_quiet(&["image", "inspect", DOCKER_IMAGE]) {
            log::info!("Pulling {} Docker image (this may take a moment)...", DOCKER_IMAGE);
            if !docker_quiet(&["pull", DOCKER_IMAGE]) {
                return None;
            }
        }

        Some(ExifToolBackend::Docker {
            image: DOCKER_IMAGE.to_string(),
        })
    }

    pub fn is_native(&self) -> bool {
        matches!(self, ExifToolBackend::Native(_))
    }

    /// exiftool with `args`, targeting `path`.
    pub fn command(&self, args: &[String], path: &Path) -> Result<Command> {
        match self {
            ExifToolBackend::Native(bin) => {
                let mut cmd = Command::new(bin);
                cmd.args(args).arg(path);
                Ok(cmd)
            }
            ExifToolBackend::Docker { image } => {
                let abs = fs::canonicalize(path)?;
                let dir = abs
                    .parent()
                    .ok_or_else(|| Error::ExifTool(format!("no parent directory for {}", abs.display())))?;
                let file = abs
                    .file_name()
                    .ok_or_else(|| Error::ExifTool(format!("no file name in {}", abs.display())))?;

                let mut cmd = Command::new("docker");
                cmd.args(["run", "--rm", "-v"])
                    .arg(format!("{}:/work", dir.display()))
                    .arg(image)
                    .args(args)
                    .arg(Path::new("/work").join(file));
                Ok(cmd)
            }
        }
    }

    /// Set every field in [`WRITE_FIELDS`] to `ts` in one invocation.
    pub fn write_timestamp(&self, path: &Path, ts: NaiveDateTime) -> Result<()> {
        let output = self
            .command(&write_args(ts), path)?
            .output()
            .map_err(|e| Error::ExifTool(format!("failed to run exiftool: {}", e)))?;

        if !output.status.success() {
            return Err(Error::ExifTool(format!(
                "{} ({})",
                String::from_utf8_lossy(&output.stderr).trim(),
                output.status
            )));
        }
        Ok(())
    }

    /// First parseable date among [`READ_FIELDS`].
    pub fn read_timestamp(&self, path: &Path) -> Option<NaiveDateTime> {
        let mut args = vec!["-j".to_string()];
        args.extend(READ_FIELDS.iter().map(|f| format!("-{}", f)));

        let output = self.command(&args, path).ok()?.output().ok()?;
        if !output.status.success() {
            return None;
        }
        parse_read_output(&output.stdout)
    }
}

fn docker_quiet(args: &[&str]) -> bool {
    Command::new("docker")
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|s| s.success())
}

pub fn write_args(ts: NaiveDateTime) -> Vec<String> {
    let value = ts.format("%Y:%m:%d %H:%M:%S").to_string();
    let mut args = vec!["-overwrite_original".to_string()];
    args.extend(WRITE_FIELDS.iter().map(|f| format!("-{}={}", f, value)));
    args
}

/// exiftool `-j` prints an array with one object per file.
fn parse_read_output(stdout: &[u8]) -> Option<NaiveDateTime> {
    let value: serde_json::Value = serde_json::from_slice(stdout).ok()?;
    let obj = value.as_array()?.first()?;

    READ_FIELDS
        .iter()
        .filter_map(|f| obj.get(*f)?.as_str())
        .find_map(parse_capture_datetime)
}
