//! Staging area - a private per-operation directory shared with the program
//!
//! The area owns a uniquely named directory seeded with the input files of
//! one lifecycle operation. It is an RAII guard: [`StagingArea::close`]
//! removes the directory and reports failures, and dropping an area that was
//! never closed still removes it.

use crate::diag::Diagnostics;
use crate::error::{Error, Result};
use crate::record::ResourceData;
use crate::settings::StagingBase;
use crate::types::ProviderConfig;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Name prefix of every staging directory
pub const DIR_PREFIX: &str = "custom-provider-";

/// Read/write for the owner, the program overwrites these
pub const MODE_RESULT: u32 = 0o600;

/// Read-only for the owner
pub const MODE_INPUT: u32 = 0o400;

/// One file written into the staging directory
#[derive(Clone, PartialEq, Eq)]
pub struct StagingFile {
    pub name: &'static str,
    pub content: String,
    pub mode: u32,
}

impl StagingFile {
    fn input(name: &'static str, content: &str) -> Self {
        Self {
            name,
            content: content.to_string(),
            mode: MODE_INPUT,
        }
    }

    fn result(name: &'static str, content: &str) -> Self {
        Self {
            name,
            content: content.to_string(),
            mode: MODE_RESULT,
        }
    }

    /// The file set for one operation over `data`
    pub fn set_for(data: &dyn ResourceData, provider: &ProviderConfig) -> Vec<StagingFile> {
        vec![
            Self::input("provider_input", &provider.input),
            Self::input("provider_input_sensitive", &provider.input_sensitive),
            Self::input("input", data.input()),
            Self::input("input_sensitive", data.input_sensitive()),
            Self::result("state", data.new_state()),
            Self::input("old_state", data.old_state()),
            Self::result("id", data.id()),
        ]
    }
}

// Contents may be sensitive, so they are never printed.
impl std::fmt::Debug for StagingFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagingFile")
            .field("name", &self.name)
            .field("len", &self.content.len())
            .field("mode", &format_args!("{:o}", self.mode))
            .finish()
    }
}

/// A staging directory and the files written into it
#[derive(Debug)]
pub struct StagingArea {
    base: StagingBase,
    files: Vec<StagingFile>,
    dir: Option<TempDir>,
}

impl StagingArea {
    pub fn new(base: StagingBase, files: Vec<StagingFile>) -> Self {
        Self {
            base,
            files,
            dir: None,
        }
    }

    /// Directory of an open area
    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(TempDir::path)
    }

    pub fn files(&self) -> &[StagingFile] {
        &self.files
    }

    /// Create the directory and write every staged file
    ///
    /// Stops at the first failure. A directory created before the failure
    /// stays in place until [`close`](Self::close) is called.
    pub fn open(&mut self) -> Diagnostics {
        match self.try_open() {
            Ok(()) => Diagnostics::new(),
            Err(err) => err.into(),
        }
    }

    fn try_open(&mut self) -> Result<()> {
        let parent = resolve_base(&self.base)?;
        let dir = tempfile::Builder::new()
            .prefix(DIR_PREFIX)
            .tempdir_in(&parent)
            .map_err(|source| Error::CreateDir {
                parent: parent.clone(),
                source,
            })?;
        let path = dir.path().to_path_buf();
        log::debug!("Opened staging directory {}", path.display());
        self.dir = Some(dir);

        for file in &self.files {
            write_file(&path.join(file.name), &file.content, file.mode)?;
        }
        Ok(())
    }

    /// Remove the directory and everything in it
    ///
    /// A no-op when the area is not open. Failure to remove is a warning.
    pub fn close(&mut self) -> Diagnostics {
        let Some(dir) = self.dir.take() else {
            return Diagnostics::new();
        };
        let path = dir.path().to_path_buf();
        match remove_dir(dir) {
            Ok(()) => {
                log::debug!("Removed staging directory {}", path.display());
                Diagnostics::new()
            }
            Err(source) => Error::Cleanup { path, source }.into(),
        }
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            log::warn!("Staging directory {} dropped without close", path.display());
            if let Err(e) = remove_dir(dir) {
                log::warn!("Failed to remove {}: {}", path.display(), e);
            }
        }
    }
}

/// A directory the program already removed counts as cleaned up.
fn remove_dir(dir: TempDir) -> io::Result<()> {
    match dir.close() {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

fn resolve_base(base: &StagingBase) -> Result<PathBuf> {
    match base {
        StagingBase::WorkingDir => std::env::current_dir().map_err(Error::WorkingDir),
        StagingBase::Fixed(path) => {
            create_base_dir(path).map_err(|source| Error::CreateDir {
                parent: path.clone(),
                source,
            })?;
            Ok(path.clone())
        }
    }
}

/// Create-if-absent, so concurrent operations may share the base.
fn create_base_dir(path: &Path) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(path)
}

fn write_file(path: &Path, content: &str, mode: u32) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;

    let wrap = |source| Error::WriteFile {
        path: path.to_path_buf(),
        source,
    };
    let mut file = options.open(path).map_err(wrap)?;
    file.write_all(content.as_bytes()).map_err(wrap)?;
    file.flush().map_err(wrap)?;
    Ok(())
}
