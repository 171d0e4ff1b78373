// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Collaborators the pipeline consumes but does not own.
//!
//! The translate thread only ever talks to these traits. [`ProcessHost`],
//! [`LocalResources`] and [`LocalTempFile`] are the stock implementations
//! used by the CLI; tests substitute scripted ones.

mod local;
mod process_host;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::subprocess::Stage;
use crate::core::wire::{Descriptor, RpcFailure, RpcReply, RpcRequest};

pub use local::{LocalResources, LocalTempFile};
pub use process_host::{
    ENV_MANIFEST, ENV_SANDBOX_ARCH, ENV_STAGE, ENV_URL, ProcessHost, ProcessTransport,
};

/// Resolves stage programs.
pub trait ResourceProvider: Send + Sync {
    /// Logical URL of the compiler program.
    fn compiler_url(&self) -> String;

    /// Logical URL of the linker program.
    fn linker_url(&self) -> String;

    /// Full URL for `url` on `sandbox_arch`. Distinct from the application's
    /// own URL so debuggers can tell translator processes apart.
    fn full_url(&self, url: &str, sandbox_arch: &str) -> String;

    /// Local file backing `url`, if there is one.
    fn locate(&self, url: &str) -> Option<PathBuf>;
}

/// Quota-managed temporary file.
pub trait TempFile: Send + Sync {
    /// Identifier registered with a subprocess's resource tracker.
    fn identifier(&self) -> &str;

    fn read_handle(&self) -> Descriptor;

    fn write_handle(&self) -> Descriptor;

    /// Rewind so the file can be read from the start.
    fn reset_for_read(&self) -> std::io::Result<()>;
}

/// Files a stage program may open besides the descriptors it is handed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub files: BTreeMap<String, PathBuf>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, key: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.files.insert(key.into(), path.into());
        self
    }

    pub fn resolve(&self, key: &str) -> Option<&Path> {
        self.files.get(key).map(PathBuf::as_path)
    }
}

/// Everything a host needs to start one stage subprocess.
#[derive(Debug, Clone, Copy)]
pub struct LaunchRequest<'a> {
    pub stage: Stage,
    pub url: &'a str,
    pub full_url: &'a str,
    /// Program file from [`ResourceProvider::locate`].
    pub program: Option<&'a Path>,
    pub manifest: &'a Manifest,
}

/// Host runtime able to start stage subprocesses.
pub trait SubprocessHost: Send + Sync {
    /// Target architecture string reported to stage programs.
    fn sandbox_arch(&self) -> String;

    /// Start a subprocess. The error string is surfaced to the user.
    fn launch(&self, request: &LaunchRequest<'_>) -> Result<Box<dyn RpcTransport>, String>;
}

/// Connection to one running subprocess.
pub trait RpcTransport: Send + Sync {
    /// Send `request` and block until the reply or the connection dies.
    ///
    /// Must only return [`RpcFailure::Transport`]; application errors are
    /// carried in [`RpcReply::AppError`].
    fn call(&self, request: &RpcRequest) -> Result<RpcReply, RpcFailure>;

    /// Tear the subprocess down. Callable from any thread; a `call` blocked
    /// on another thread must return promptly with a transport failure.
    fn close(&self);
}
