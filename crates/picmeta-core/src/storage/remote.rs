use std::fs::File;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use super::{shell_quote, Destination, LocalFile, MediaSource};
use crate::error::{Error, Result};
use crate::media::extension_of;

/// A host reached through the system `ssh` client. Authentication is left
/// to the user's ssh configuration and agent; batch mode makes a missing
/// key fail fast instead of prompting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshRemote {
    host: String,
    target: String,
    port: Option<u16>,
    transport: Transport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transport {
    Ssh,
    /// Runs the remote command with the local `sh`.
    #[cfg(test)]
    LocalShell,
}

impl SshRemote {
    /// `host` is `[user@]host[:port]` or an alias from the ssh config.
    pub fn new(host: impl Into<String>) -> Self {
        let host = host.into();
        let (user, rest) = match host.split_once('@') {
            Some((u, r)) => (Some(u), r),
            None => (None, host.as_str()),
        };
        let (name, port) = match rest.rsplit_once(':') {
            Some((n, p)) => match p.parse::<u16>() {
                Ok(port) => (n, Some(port)),
                Err(_) => (rest, None),
            },
            None => (rest, None),
        };
        let target = match user {
            Some(u) => format!("{}@{}", u, name),
            None => name.to_string(),
        };
        Self {
            host,
            target,
            port,
            transport: Transport::Ssh,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn command(&self, remote_cmd: &str) -> Command {
        let mut cmd = match self.transport {
            Transport::Ssh => {
                let mut cmd = Command::new("ssh");
                cmd.args(["-o", "BatchMode=yes", "-T"]);
                if let Some(port) = self.port {
                    cmd.arg("-p").arg(port.to_string());
                }
                cmd.arg(&self.target);
                cmd
            }
            #[cfg(test)]
            Transport::LocalShell => {
                let mut cmd = Command::new("sh");
                cmd.arg("-c");
                cmd
            }
        };
        cmd.arg(remote_cmd).stdin(Stdio::null());
        cmd
    }

    fn run(&self, remote_cmd: &str) -> Result<Output> {
        self.command(remote_cmd)
            .output()
            .map_err(|e| Error::Remote(format!("failed to run ssh {}: {}", self.host, e)))
    }

    fn check(&self, remote_cmd: &str, output: &Output) -> Result<()> {
        if output.status.success() {
            return Ok(());
        }
        Err(Error::Remote(format!(
            "{} on {}: {} ({})",
            remote_cmd,
            self.host,
            String::from_utf8_lossy(&output.stderr).trim(),
            output.status
        )))
    }

    /// Stream `remote` into the local file `local` and sync it.
    pub fn download(&self, remote: &str, local: &Path) -> Result<()> {
        let file = File::create(local)?;
        let remote_cmd = format!("cat {}", shell_quote(remote));
        let output = self
            .command(&remote_cmd)
            .stdout(Stdio::from(file.try_clone()?))
            .stderr(Stdio::piped())
            .spawn()
            .and_then(|child| child.wait_with_output())
            .map_err(|e| Error::Remote(format!("failed to run ssh {}: {}", self.host, e)))?;
        self.check(&remote_cmd, &output)?;
        file.sync_all()?;
        Ok(())
    }

    /// Stream the local file `local` to `remote`, creating its directory.
    /// Returns once the remote host has flushed the data.
    pub fn upload(&self, local: &Path, remote: &Path) -> Result<()> {
        let remote_cmd = upload_command(&remote.to_string_lossy());
        let output = self
            .command(&remote_cmd)
            .stdin(Stdio::from(File::open(local)?))
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .and_then(|child| child.wait_with_output())
            .map_err(|e| Error::Remote(format!("failed to run ssh {}: {}", self.host, e)))?;
        self.check(&remote_cmd, &output)
    }

    fn fetch_temp(&self, remote: &str) -> Result<tempfile::TempPath> {
        let temp = tempfile::Builder::new()
            .prefix("picmeta-")
            .suffix(extension_of(remote))
            .tempfile()?
            .into_temp_path();
        self.download(remote, &temp)?;
        Ok(temp)
    }
}

/// `find` output: one path per line, blank lines dropped.
fn parse_listing(stdout: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Exit code of `test -f`: 0 present, 1 absent, anything else unknown.
fn presence_from_code(code: Option<i32>) -> Option<bool> {
    match code {
        Some(0) => Some(true),
        Some(1) => Some(false),
        _ => None,
    }
}

/// Remote shell line that writes stdin to `remote` and syncs it.
fn upload_command(remote: &str) -> String {
    let dir = remote.rsplit_once('/').map(|(d, _)| d).filter(|d| !d.is_empty());
    match dir {
        Some(d) => format!(
            "mkdir -p {} && cat > {} && sync",
            shell_quote(d),
            shell_quote(remote)
        ),
        None => format!("cat > {} && sync", shell_quote(remote)),
    }
}

impl MediaSource for SshRemote {
    fn list_files(&self, root: &str) -> Result<Vec<String>> {
        let remote_cmd = format!("find {} -type f", shell_quote(root));
        let enumeration = |reason: String| Error::Enumeration {
            root: format!("{}:{}", self.host, root),
            reason,
        };
        let output = self.run(&remote_cmd).map_err(|e| enumeration(e.to_string()))?;
        self.check(&remote_cmd, &output).map_err(|e| enumeration(e.to_string()))?;

        Ok(parse_listing(&output.stdout))
    }

    fn fetch(&self, path: &str) -> Result<LocalFile> {
        self.fetch_temp(path).map(LocalFile::Temp)
    }
}

impl Destination for SshRemote {
    fn exists(&self, path: &Path) -> Result<bool> {
        let remote_cmd = format!("test -f {}", shell_quote(&path.to_string_lossy()));
        let output = self.run(&remote_cmd)?;
        match presence_from_code(output.status.code()) {
            Some(found) => Ok(found),
            None => self.check(&remote_cmd, &output).map(|_| false),
        }
    }

    fn transfer(&self, src: &Path, dest: &Path) -> Result<()> {
        self.upload(src, dest).map_err(|e| Error::transfer(dest, e))
    }

    fn edit_in_place(&self, dest: &Path, edit: &mut dyn FnMut(&Path) -> Result<()>) -> Result<()> {
        let temp = self.fetch_temp(&dest.to_string_lossy())?;
        edit(&temp)?;
        self.upload(&temp, dest)
    }
}
