// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Translator configuration via `xlate.yaml`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::error::{Result, TranslateError};
use crate::core::host::Manifest;
use crate::core::options::{MAX_OPT_LEVEL, TranslateOptions};
use crate::core::wire::MAX_OBJECT_FILES;

/// Worker thread stack size. The worker only shuttles buffers and makes
/// blocking calls, so this stays small.
pub const DEFAULT_THREAD_STACK_SIZE: usize = 128 * 1024;

pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslateConfig {
    /// Compiler program.
    pub compiler: PathBuf,

    /// Linker program.
    pub linker: PathBuf,

    /// Architecture string reported to stage programs.
    pub sandbox_arch: String,

    /// Number of object files the compiler splits its output into.
    pub object_files: usize,

    pub thread_stack_size: usize,

    /// Read size used when streaming an input file.
    pub chunk_size: usize,

    pub options: TranslateOptions,

    /// Environment variables to inject into stage subprocesses.
    pub env: HashMap<String, String>,

    pub manifest: Manifest,
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            compiler: PathBuf::from("xlate-llc"),
            linker: PathBuf::from("xlate-ld"),
            sandbox_arch: default_sandbox_arch().to_string(),
            object_files: 1,
            thread_stack_size: DEFAULT_THREAD_STACK_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            options: TranslateOptions::default(),
            env: HashMap::new(),
            manifest: Manifest::default(),
        }
    }
}

/// Sandbox architecture name for the machine we are running on.
pub fn default_sandbox_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "x86-64",
        "x86" => "x86-32",
        "arm" => "arm",
        "mips" => "mips32",
        other => other,
    }
}

impl TranslateConfig {
    /// Configuration file name.
    pub const FILE_NAME: &'static str = "xlate.yaml";

    /// Load and validate a configuration file.
    pub fn load(config_path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(config_path).map_err(|e| {
            TranslateError::Configuration(format!(
                "Failed to read {}: {}",
                config_path.display(),
                e
            ))
        })?;

        let config: Self = serde_yaml::from_str(&content).map_err(|e| {
            TranslateError::Configuration(format!(
                "Failed to parse {}: {}",
                config_path.display(),
                e
            ))
        })?;
        config.validate()?;

        tracing::info!("Loaded translator config from {}", config_path.display());
        Ok(config)
    }

    /// Load `xlate.yaml` from a directory, returning defaults if the file is
    /// missing or invalid.
    pub fn load_or_default(dir: &Path) -> Self {
        let config_path = dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            tracing::debug!(
                "No {} found in {}, using defaults",
                Self::FILE_NAME,
                dir.display()
            );
            return Self::default();
        }

        match Self::load(&config_path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("{}, using defaults", e);
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.object_files == 0 || self.object_files > MAX_OBJECT_FILES {
            return Err(TranslateError::Configuration(format!(
                "object_files must be between 1 and {}, got {}",
                MAX_OBJECT_FILES, self.object_files
            )));
        }
        if self.options.opt_level > MAX_OPT_LEVEL {
            return Err(TranslateError::Configuration(format!(
                "opt_level must be at most {}, got {}",
                MAX_OPT_LEVEL, self.options.opt_level
            )));
        }
        if self.thread_stack_size == 0 {
            return Err(TranslateError::Configuration(
                "thread_stack_size must be non-zero".to_string(),
            ));
        }
        if self.chunk_size == 0 {
            return Err(TranslateError::Configuration(
                "chunk_size must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
