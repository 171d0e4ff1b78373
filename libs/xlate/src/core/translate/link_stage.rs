// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Links the compiler's object files into the final artifact.

use std::sync::Arc;
use std::time::Instant;

use super::job::TranslateJob;
use super::pipeline::TranslateShared;
use crate::core::error::{Result, TranslateError};
use crate::core::subprocess::{Stage, SubprocessHandle};
use crate::core::wire::{Descriptor, RpcArg, RpcFailure, RpcMethod, pad_descriptors};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LinkState {
    NotStarted,
    Initializing,
    Linking,
    Succeeded,
    Failed,
}

pub(crate) struct LinkStage<'a> {
    shared: &'a TranslateShared,
    job: &'a TranslateJob,
    state: LinkState,
}

impl<'a> LinkStage<'a> {
    pub(crate) fn new(shared: &'a TranslateShared, job: &'a TranslateJob) -> Self {
        Self {
            shared,
            job,
            state: LinkState::NotStarted,
        }
    }

    pub(crate) fn state(&self) -> LinkState {
        self.state
    }

    fn enter(&mut self, state: LinkState) {
        tracing::trace!("[{}] link: {:?} -> {:?}", self.shared.id, self.state, state);
        self.state = state;
    }

    pub(crate) fn run(&mut self) -> Result<()> {
        let result = self.run_states();
        self.enter(if result.is_ok() {
            LinkState::Succeeded
        } else {
            LinkState::Failed
        });
        result
    }

    fn run_states(&mut self) -> Result<()> {
        self.enter(LinkState::Initializing);
        let (linker, inputs) = self.initialize()?;

        self.enter(LinkState::Linking);
        let job = self.job;
        let count = job.object_files.len();

        let mut args = Vec::with_capacity(18);
        args.push(RpcArg::Int(count as i32));
        args.extend(pad_descriptors(&inputs).into_iter().map(RpcArg::Handle));
        args.push(RpcArg::Handle(job.output.write_handle()));

        let started = Instant::now();
        match linker.call_blocking(RpcMethod::RunWithSplit, args) {
            Ok(_) => {}
            Err(RpcFailure::Application { message }) => {
                return Err(TranslateError::LinkInternal(format!(
                    "Link failed: {}",
                    message
                )));
            }
            Err(RpcFailure::Transport { reason }) => {
                tracing::warn!("[{}] RunWithSplit transport failure: {}", self.shared.id, reason);
                return Err(TranslateError::LinkInternal("Link failed.".to_string()));
            }
        }
        self.shared.stats.lock().link_time = Some(started.elapsed());
        tracing::info!("[{}] Link succeeded", self.shared.id);

        self.shared.release_linker();
        Ok(())
    }

    fn initialize(&mut self) -> Result<(Arc<SubprocessHandle>, Vec<Descriptor>)> {
        let job = self.job;

        let mut inputs = Vec::with_capacity(job.object_files.len());
        for file in &job.object_files {
            if let Err(e) = file.reset_for_read() {
                tracing::warn!(
                    "[{}] Could not reset {}: {}",
                    self.shared.id,
                    file.identifier(),
                    e
                );
                return Err(TranslateError::LinkSetup(
                    "Link process could not reset object file".to_string(),
                ));
            }
            inputs.push(file.read_handle());
        }

        let mut active = self.shared.subprocesses.lock();
        if self.shared.is_aborted() {
            return Err(TranslateError::Aborted);
        }

        let url = job.resources.linker_url();
        let handle = SubprocessHandle::launch(
            Stage::Link,
            &url,
            job.resources.as_ref(),
            job.host.as_ref(),
            &job.manifest,
        )
        .map_err(|e| match e {
            TranslateError::SubprocessLaunch { message, .. } => TranslateError::LinkSetup(format!(
                "Link process could not be created: {}",
                message
            )),
            other => other,
        })?;

        handle.allow_file(job.output.identifier());
        self.shared.stats.lock().linker_load_time = Some(handle.load_time());
        tracing::info!("[{}] Linker started: {}", self.shared.id, handle.url());

        let handle = Arc::new(handle);
        active.link = Some(Arc::clone(&handle));
        Ok((handle, inputs))
    }
}
