//! PID file guard.
//!
//! The file is created atomically with `create_new`, so a second daemon
//! pointed at the same path fails instead of overwriting it. The file is
//! removed when the guard is dropped.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Holds the PID file for the lifetime of the daemon.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Write the current process id to `path`.
    ///
    /// Missing parent directories are created (mode 0700 on unix) and the
    /// file itself is created with mode 0600.
    ///
    /// # Errors
    ///
    /// - the file already exists (another instance is likely running)
    /// - the path is not a regular file after creation
    /// - any I/O failure
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_private_dir(parent)
                .with_context(|| format!("failed to create PID directory {}", parent.display()))?;
        }

        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = match options.open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let existing = fs::read_to_string(&path).unwrap_or_else(|_| "unknown".to_owned());
                return Err(anyhow::anyhow!(
                    "PID file {} already exists with PID {}; is another instance running?",
                    path.display(),
                    existing.trim()
                ));
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to create PID file {}", path.display()));
            }
        };

        if !file.metadata()?.is_file() {
            let _ = fs::remove_file(&path);
            return Err(anyhow::anyhow!(
                "PID file {} is not a regular file",
                path.display()
            ));
        }

        let pid = std::process::id();
        writeln!(file, "{pid}")?;
        tracing::info!(pid, path = %path.display(), "PID file written");

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => tracing::info!(path = %self.path.display(), "PID file removed"),
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "failed to remove PID file"
            ),
        }
    }
}

fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir)
}
