// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Filesystem-backed resources and temp files.

use std::io::{Seek, SeekFrom};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tempfile::NamedTempFile;

use super::{ResourceProvider, TempFile};
use crate::core::config::TranslateConfig;
use crate::core::wire::{Access, Descriptor};

const COMPILER_URL: &str = "compiler";
const LINKER_URL: &str = "linker";

/// Stage programs found at fixed paths on disk.
#[derive(Debug, Clone)]
pub struct LocalResources {
    compiler: PathBuf,
    linker: PathBuf,
}

impl LocalResources {
    pub fn new(compiler: impl Into<PathBuf>, linker: impl Into<PathBuf>) -> Self {
        Self {
            compiler: compiler.into(),
            linker: linker.into(),
        }
    }

    pub fn from_config(config: &TranslateConfig) -> Self {
        Self::new(&config.compiler, &config.linker)
    }
}

impl ResourceProvider for LocalResources {
    fn compiler_url(&self) -> String {
        COMPILER_URL.to_string()
    }

    fn linker_url(&self) -> String {
        LINKER_URL.to_string()
    }

    fn full_url(&self, url: &str, sandbox_arch: &str) -> String {
        format!("xlate://{}/{}", sandbox_arch, url)
    }

    fn locate(&self, url: &str) -> Option<PathBuf> {
        match url {
            COMPILER_URL => Some(self.compiler.clone()),
            LINKER_URL => Some(self.linker.clone()),
            _ => None,
        }
    }
}

/// Temp file on local disk, removed when dropped.
#[derive(Debug)]
pub struct LocalTempFile {
    id: String,
    path: PathBuf,
    file: Mutex<NamedTempFile>,
}

impl LocalTempFile {
    pub fn new() -> std::io::Result<Self> {
        Self::from_named(NamedTempFile::new()?)
    }

    pub fn new_in(dir: impl AsRef<Path>) -> std::io::Result<Self> {
        Self::from_named(NamedTempFile::new_in(dir)?)
    }

    fn from_named(file: NamedTempFile) -> std::io::Result<Self> {
        let id = format!("F{}", cuid2::create_id());
        let path = file.path().to_path_buf();
        tracing::trace!("[{}] Temp file at {}", id, path.display());
        Ok(Self {
            id,
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current size on disk.
    pub fn len(&self) -> std::io::Result<u64> {
        Ok(std::fs::metadata(&self.path)?.len())
    }

    pub fn is_empty(&self) -> std::io::Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Copy the contents to `dest`, leaving the temp file in place.
    pub fn persist_copy(&self, dest: impl AsRef<Path>) -> std::io::Result<u64> {
        std::fs::copy(&self.path, dest)
    }
}

impl TempFile for LocalTempFile {
    fn identifier(&self) -> &str {
        &self.id
    }

    fn read_handle(&self) -> Descriptor {
        Descriptor::File {
            id: self.id.clone(),
            path: self.path.clone(),
            access: Access::Read,
        }
    }

    fn write_handle(&self) -> Descriptor {
        Descriptor::File {
            id: self.id.clone(),
            path: self.path.clone(),
            access: Access::Write,
        }
    }

    fn reset_for_read(&self) -> std::io::Result<()> {
        // The writer is another process; make sure the file still exists
        // before handing out a read handle.
        std::fs::metadata(&self.path)?;
        let mut file = self.file.lock();
        file.as_file_mut().sync_all()?;
        file.seek(SeekFrom::Start(0))?;
        Ok(())
    }
}
