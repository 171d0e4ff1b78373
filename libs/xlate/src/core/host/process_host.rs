// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Stage subprocesses as native child processes speaking framed RPC over stdio.

use std::collections::HashMap;
use std::io::{BufReader, BufWriter};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use parking_lot::Mutex;

use super::{LaunchRequest, RpcTransport, SubprocessHost};
use crate::core::config::TranslateConfig;
use crate::core::wire::{RpcFailure, RpcReply, RpcRequest, read_frame, write_frame};

pub const ENV_STAGE: &str = "XLATE_STAGE";
pub const ENV_URL: &str = "XLATE_URL";
pub const ENV_SANDBOX_ARCH: &str = "XLATE_SANDBOX_ARCH";
pub const ENV_MANIFEST: &str = "XLATE_MANIFEST";

/// Launches stage programs with [`Command`].
#[derive(Debug, Clone)]
pub struct ProcessHost {
    sandbox_arch: String,
    env: HashMap<String, String>,
}

impl ProcessHost {
    pub fn new(sandbox_arch: impl Into<String>) -> Self {
        Self {
            sandbox_arch: sandbox_arch.into(),
            env: HashMap::new(),
        }
    }

    /// Extra environment for every launched stage program.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn from_config(config: &TranslateConfig) -> Self {
        Self {
            sandbox_arch: config.sandbox_arch.clone(),
            env: config.env.clone(),
        }
    }
}

impl SubprocessHost for ProcessHost {
    fn sandbox_arch(&self) -> String {
        self.sandbox_arch.clone()
    }

    fn launch(&self, request: &LaunchRequest<'_>) -> Result<Box<dyn RpcTransport>, String> {
        let program = request
            .program
            .ok_or_else(|| format!("no program available for '{}'", request.url))?;

        let manifest = serde_json::to_string(request.manifest)
            .map_err(|e| format!("failed to encode manifest: {}", e))?;

        let mut child = Command::new(program)
            .envs(&self.env)
            .env(ENV_STAGE, request.stage.as_str())
            .env(ENV_URL, request.full_url)
            .env(ENV_SANDBOX_ARCH, &self.sandbox_arch)
            .env(ENV_MANIFEST, manifest)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| format!("{}: {}", program.display(), e))?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let (Some(stdin), Some(stdout)) = (stdin, stdout) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err("failed to capture subprocess stdio".to_string());
        };

        let pid = child.id();
        tracing::info!(
            "[{}] Spawned {} (pid {})",
            request.stage,
            program.display(),
            pid
        );

        Ok(Box::new(ProcessTransport {
            name: request.full_url.to_string(),
            pid,
            io: Mutex::new(Some(ProcessIo {
                stdin: BufWriter::new(stdin),
                stdout: BufReader::new(stdout),
            })),
            child: Mutex::new(Some(child)),
        }))
    }
}

struct ProcessIo {
    stdin: BufWriter<ChildStdin>,
    stdout: BufReader<ChildStdout>,
}

/// Framed RPC over a child's stdin/stdout.
///
/// `io` and `child` are locked separately so [`close`](RpcTransport::close)
/// can kill the child while a call is blocked reading its reply.
pub struct ProcessTransport {
    name: String,
    pid: u32,
    io: Mutex<Option<ProcessIo>>,
    child: Mutex<Option<Child>>,
}

impl ProcessTransport {
    pub fn pid(&self) -> u32 {
        self.pid
    }
}

impl RpcTransport for ProcessTransport {
    fn call(&self, request: &RpcRequest) -> Result<RpcReply, RpcFailure> {
        let mut guard = self.io.lock();
        let io = guard
            .as_mut()
            .ok_or_else(|| RpcFailure::transport(format!("{} is closed", self.name)))?;

        if let Err(e) = write_frame(&mut io.stdin, request) {
            *guard = None;
            return Err(RpcFailure::transport(format!(
                "{}: send {} failed: {}",
                self.name, request.method, e
            )));
        }

        match read_frame::<_, RpcReply>(&mut io.stdout) {
            Ok(reply) => Ok(reply),
            Err(e) => {
                *guard = None;
                Err(RpcFailure::transport(format!(
                    "{}: no reply to {}: {}",
                    self.name, request.method, e
                )))
            }
        }
    }

    fn close(&self) {
        let Some(mut child) = self.child.lock().take() else {
            return;
        };

        if let Ok(Some(status)) = child.try_wait() {
            tracing::debug!("[{}] pid {} already exited: {}", self.name, self.pid, status);
            return;
        }

        if let Err(e) = child.kill() {
            tracing::warn!("[{}] Failed to kill pid {}: {}", self.name, self.pid, e);
        }
        match child.wait() {
            Ok(status) => {
                tracing::debug!("[{}] pid {} exited: {}", self.name, self.pid, status)
            }
            Err(e) => tracing::warn!("[{}] Failed to reap pid {}: {}", self.name, self.pid, e),
        }
    }
}

impl Drop for ProcessTransport {
    fn drop(&mut self) {
        self.close();
    }
}
