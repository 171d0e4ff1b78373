// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Streams queued bitcode into the compiler subprocess.

use std::sync::Arc;
use std::time::Instant;

use super::job::TranslateJob;
use super::pipeline::TranslateShared;
use crate::core::error::{Result, TranslateError};
use crate::core::queue::ChunkPop;
use crate::core::subprocess::{Stage, SubprocessHandle};
use crate::core::wire::{RpcArg, RpcFailure, RpcMethod, pad_descriptors};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompileState {
    NotStarted,
    Initializing,
    Streaming,
    Finalizing,
    Succeeded,
    Failed,
}

pub(crate) struct CompileStage<'a> {
    shared: &'a TranslateShared,
    job: &'a TranslateJob,
    state: CompileState,
}

impl<'a> CompileStage<'a> {
    pub(crate) fn new(shared: &'a TranslateShared, job: &'a TranslateJob) -> Self {
        Self {
            shared,
            job,
            state: CompileState::NotStarted,
        }
    }

    pub(crate) fn state(&self) -> CompileState {
        self.state
    }

    fn enter(&mut self, state: CompileState) {
        tracing::trace!(
            "[{}] compile: {:?} -> {:?}",
            self.shared.id,
            self.state,
            state
        );
        self.state = state;
    }

    /// Drive the compiler to completion. On success the compiler has been
    /// shut down.
    pub(crate) fn run(&mut self) -> Result<()> {
        let result = self.run_states();
        self.enter(if result.is_ok() {
            CompileState::Succeeded
        } else {
            CompileState::Failed
        });
        result
    }

    fn run_states(&mut self) -> Result<()> {
        self.enter(CompileState::Initializing);
        let compiler = self.initialize()?;

        self.enter(CompileState::Streaming);
        let started = Instant::now();
        self.stream(&compiler)?;

        if self.shared.is_aborted() {
            return Err(TranslateError::Aborted);
        }

        self.enter(CompileState::Finalizing);
        self.finalize(&compiler)?;
        self.shared.stats.lock().compile_time = Some(started.elapsed());

        self.shared.release_compiler();
        Ok(())
    }

    fn initialize(&mut self) -> Result<Arc<SubprocessHandle>> {
        let id = &self.shared.id;
        let job = self.job;

        let compiler = {
            let mut active = self.shared.subprocesses.lock();
            if self.shared.is_aborted() {
                return Err(TranslateError::Aborted);
            }

            let url = job.resources.compiler_url();
            let handle = SubprocessHandle::launch(
                Stage::Compile,
                &url,
                job.resources.as_ref(),
                job.host.as_ref(),
                &job.manifest,
            )
            .map_err(|e| match e {
                TranslateError::SubprocessLaunch { message, .. } => TranslateError::CompileSetup(
                    format!("Compile process could not be created: {}", message),
                ),
                other => other,
            })?;

            for file in &job.object_files {
                handle.allow_file(file.identifier());
            }
            self.shared.stats.lock().compiler_load_time = Some(handle.load_time());

            let handle = Arc::new(handle);
            active.compile = Some(Arc::clone(&handle));
            handle
        };
        tracing::info!("[{}] Compiler started: {}", id, compiler.url());

        let count = job.object_files.len();
        let outputs: Vec<_> = job.object_files.iter().map(|f| f.write_handle()).collect();
        let mut args = Vec::with_capacity(18);
        args.push(RpcArg::Int(count as i32));
        args.extend(pad_descriptors(&outputs).into_iter().map(RpcArg::Handle));
        args.push(RpcArg::Bytes(job.options.init_option_buffer(count)));

        match compiler.call_blocking(RpcMethod::StreamInitWithSplit, args) {
            Ok(_) => {
                tracing::debug!("[{}] StreamInitWithSplit ok ({} modules)", id, count);
                Ok(compiler)
            }
            Err(RpcFailure::Application { message }) => Err(TranslateError::CompileSetup(
                format!("Stream init failed: {}", message),
            )),
            Err(RpcFailure::Transport { reason }) => {
                tracing::debug!("[{}] StreamInitWithSplit transport failure: {}", id, reason);
                Err(TranslateError::CompileSetup(
                    "Stream init internal error".to_string(),
                ))
            }
        }
    }

    /// Forward chunks until the queue finishes. A compiler-reported error
    /// only stops the stream; `StreamEnd` decides the outcome.
    fn stream(&mut self, compiler: &SubprocessHandle) -> Result<()> {
        let id = &self.shared.id;

        loop {
            let chunk = match self.shared.queue.pop_blocking() {
                ChunkPop::Chunk(chunk) => chunk,
                ChunkPop::Finished => return Ok(()),
            };
            let len = chunk.len();

            match compiler.call_blocking(RpcMethod::StreamChunk, vec![RpcArg::Bytes(chunk)]) {
                Ok(_) => {
                    tracing::trace!("[{}] StreamChunk ok ({} bytes)", id, len);
                    {
                        let mut stats = self.shared.stats.lock();
                        stats.bytes_streamed += len as u64;
                        stats.chunks_streamed += 1;
                    }
                    if let Some(progress) = &self.job.progress {
                        let progress = Arc::clone(progress);
                        self.job.dispatcher.post(Box::new(move || progress(len)));
                    }
                }
                Err(RpcFailure::Application { message }) => {
                    tracing::debug!("[{}] StreamChunk rejected: {}", id, message);
                    return Ok(());
                }
                Err(RpcFailure::Transport { reason }) => {
                    tracing::warn!("[{}] StreamChunk transport failure: {}", id, reason);
                    return Err(TranslateError::CompileInternal(
                        "Compile stream chunk failed. The translator has probably crashed."
                            .to_string(),
                    ));
                }
            }
        }
    }

    fn finalize(&mut self, compiler: &SubprocessHandle) -> Result<()> {
        match compiler.call_blocking(RpcMethod::StreamEnd, vec![]) {
            Ok(_) => {
                tracing::debug!("[{}] StreamEnd ok", self.shared.id);
                Ok(())
            }
            Err(RpcFailure::Application { message }) => Err(TranslateError::CompileRemote(message)),
            Err(RpcFailure::Transport { reason }) => {
                tracing::warn!("[{}] StreamEnd transport failure: {}", self.shared.id, reason);
                Err(TranslateError::CompileInternal(
                    "Compile StreamEnd internal error".to_string(),
                ))
            }
        }
    }
}
