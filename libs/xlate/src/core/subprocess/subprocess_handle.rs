// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! One live stage subprocess.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::Stage;
use crate::core::error::{Result, TranslateError};
use crate::core::host::{LaunchRequest, Manifest, ResourceProvider, RpcTransport, SubprocessHost};
use crate::core::wire::{Access, Descriptor, RpcArg, RpcFailure, RpcMethod, RpcReply, RpcRequest};

/// A launched stage subprocess and the calls made into it.
///
/// `shutdown` may run on any thread while `call_blocking` is in flight on
/// the worker; the active flag is checked on both sides of the call.
pub struct SubprocessHandle {
    stage: Stage,
    url: String,
    transport: Box<dyn RpcTransport>,
    active: AtomicBool,
    allowed_files: Mutex<HashSet<String>>,
    load_time: Duration,
}

impl SubprocessHandle {
    /// Launch the program behind `url` for `stage`.
    pub fn launch(
        stage: Stage,
        url: &str,
        resources: &dyn ResourceProvider,
        host: &dyn SubprocessHost,
        manifest: &Manifest,
    ) -> Result<Self> {
        let sandbox_arch = host.sandbox_arch();
        let full_url = resources.full_url(url, &sandbox_arch);
        let program = resources.locate(url);

        let request = LaunchRequest {
            stage,
            url,
            full_url: &full_url,
            program: program.as_deref(),
            manifest,
        };

        let started = Instant::now();
        let transport = host
            .launch(&request)
            .map_err(|message| TranslateError::SubprocessLaunch {
                url: full_url.clone(),
                message,
            })?;
        let load_time = started.elapsed();

        tracing::debug!("[{}] Launched {} in {:?}", stage, full_url, load_time);

        Ok(Self {
            stage,
            url: full_url,
            transport,
            active: AtomicBool::new(true),
            allowed_files: Mutex::new(HashSet::new()),
            load_time,
        })
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Time spent in the host's launch call.
    pub fn load_time(&self) -> Duration {
        self.load_time
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Permit the subprocess to write the temp file with this identifier.
    pub fn allow_file(&self, identifier: &str) {
        self.allowed_files.lock().insert(identifier.to_string());
    }

    /// Issue one RPC and block until it completes.
    pub fn call_blocking(
        &self,
        method: RpcMethod,
        args: Vec<RpcArg>,
    ) -> std::result::Result<RpcReply, RpcFailure> {
        if !self.is_active() {
            return Err(RpcFailure::transport(format!(
                "{} subprocess is shut down",
                self.stage
            )));
        }

        let request = RpcRequest::new(method, args)?;
        self.check_write_access(&request)?;

        let reply = self.transport.call(&request);

        if !self.is_active() {
            return Err(RpcFailure::transport(format!(
                "{} subprocess shut down during {}",
                self.stage, method
            )));
        }

        match reply? {
            RpcReply::Ok => Ok(RpcReply::Ok),
            RpcReply::AppError { message } => Err(RpcFailure::Application { message }),
        }
    }

    fn check_write_access(&self, request: &RpcRequest) -> std::result::Result<(), RpcFailure> {
        let allowed = self.allowed_files.lock();
        for handle in request.handles() {
            let Descriptor::File {
                id,
                access: Access::Write,
                ..
            } = handle
            else {
                continue;
            };
            if !allowed.contains(id) {
                return Err(RpcFailure::transport(format!(
                    "{}: file {} was not registered with the subprocess",
                    request.method, id
                )));
            }
        }
        Ok(())
    }

    /// Tear the subprocess down. Returns false if it was already shut down.
    pub fn shutdown(&self) -> bool {
        if !self.active.swap(false, Ordering::AcqRel) {
            return false;
        }
        tracing::debug!("[{}] Shutting down {}", self.stage, self.url);
        self.transport.close();
        true
    }
}

impl Drop for SubprocessHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
