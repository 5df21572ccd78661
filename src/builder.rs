//! Library builder
//!
//! Runs the project's Makefile to produce the static archive, then links a
//! shared object out of it so the tests can load it.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;

use crate::config::BuildConfig;

/// Build errors.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Makefile not found: {0}")]
    MissingMakefile(PathBuf),

    #[error("{0} was not produced by make")]
    MissingArchive(PathBuf),

    #[error("`{command}` exited with {status}")]
    CommandFailed { command: String, status: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// What the link step did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Linked,
    /// The shared object was newer than the archive
    UpToDate,
}

/// Builds `libasm.so` in a libasm repository
#[derive(Debug, Clone)]
pub struct LibraryBuilder {
    repo: PathBuf,
    config: BuildConfig,
}

impl LibraryBuilder {
    /// Builder for the repository named in `config`.
    ///
    /// The repository is made absolute; the shared object is the one
    /// [`TesterConfig::subject_path`](crate::config::TesterConfig::subject_path) loads.
    pub fn new(config: BuildConfig) -> io::Result<Self> {
        let repo = std::fs::canonicalize(&config.repo).or_else(|_| {
            std::env::current_dir().map(|cwd| cwd.join(&config.repo))
        })?;
        Ok(Self { repo, config })
    }

    pub fn repo(&self) -> &Path {
        &self.repo
    }

    pub fn static_lib(&self) -> PathBuf {
        self.repo.join(&self.config.static_lib)
    }

    pub fn shared_lib(&self) -> PathBuf {
        self.repo.join(&self.config.shared_lib)
    }

    /// Run make, then link the shared object if it is stale
    pub fn build(&self) -> Result<LinkStatus, BuildError> {
        self.make()?;
        self.link()
    }

    /// Run make in the repository
    pub fn make(&self) -> Result<(), BuildError> {
        let makefile = self.repo.join("Makefile");
        if !makefile.is_file() {
            return Err(BuildError::MissingMakefile(makefile));
        }

        log::info!("running make in {}", self.repo.display());
        let mut cmd = Command::new(&self.config.make);
        cmd.arg("-C").arg(&self.repo);
        cmd.args(&self.config.make_args);
        run(cmd)?;

        let archive = self.static_lib();
        if !archive.is_file() {
            return Err(BuildError::MissingArchive(archive));
        }
        Ok(())
    }

    /// Link the shared object out of the archive when the archive is newer
    pub fn link(&self) -> Result<LinkStatus, BuildError> {
        let archive = self.static_lib();
        let shared = self.shared_lib();
        if !archive.is_file() {
            return Err(BuildError::MissingArchive(archive));
        }

        if !needs_link(&archive, &shared)? {
            log::info!(
                "{} is newer than {}, nothing to do",
                shared.display(),
                archive.display()
            );
            return Ok(LinkStatus::UpToDate);
        }

        log::info!("linking {} out of {}", shared.display(), archive.display());
        let mut cmd = Command::new(&self.config.cc);
        cmd.arg("-shared")
            .arg("-o")
            .arg(&shared)
            .arg("-Wl,--whole-archive")
            .arg(&archive)
            .arg("-Wl,--no-whole-archive");
        run(cmd)?;
        Ok(LinkStatus::Linked)
    }

    /// Remove the shared object, if any
    pub fn clean(&self) -> Result<(), BuildError> {
        let shared = self.shared_lib();
        match std::fs::remove_file(&shared) {
            Ok(()) => {
                log::info!("removed {}", shared.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Whether `shared` is missing or older than `archive`
pub fn needs_link(archive: &Path, shared: &Path) -> io::Result<bool> {
    let shared_time = match std::fs::metadata(shared) {
        Ok(meta) => meta.modified()?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(e),
    };
    let archive_time = std::fs::metadata(archive)?.modified()?;
    Ok(archive_time > shared_time)
}

fn run(mut cmd: Command) -> Result<(), BuildError> {
    let command = format!("{:?}", cmd);
    log::debug!("exec {}", command);
    let status = cmd.status()?;
    if !status.success() {
        return Err(BuildError::CommandFailed {
            command,
            status: status.to_string(),
        });
    }
    Ok(())
}
