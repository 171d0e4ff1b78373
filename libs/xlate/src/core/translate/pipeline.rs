// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Translate thread coordinator.
//!
//! The owner thread feeds bitcode and may abort at any time. One worker
//! thread runs the compile stage then the link stage, and the outcome is
//! posted back through the job's dispatcher exactly once per `start`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use parking_lot::Mutex;

use super::compile_stage::CompileStage;
use super::job::{CompletionCallback, TranslateJob, TranslateStatus};
use super::link_stage::LinkStage;
use super::stats::TimeStats;
use crate::core::config::{DEFAULT_THREAD_STACK_SIZE, TranslateConfig};
use crate::core::dispatch::CallbackDispatcher;
use crate::core::error::{Result, TranslateError};
use crate::core::error_sink::ErrorSink;
use crate::core::queue::ChunkQueue;
use crate::core::subprocess::SubprocessHandle;
use crate::core::wire::MAX_OBJECT_FILES;

/// Subprocesses the owner thread may need to shut down.
#[derive(Default)]
pub(crate) struct ActiveSubprocesses {
    pub(crate) compile: Option<Arc<SubprocessHandle>>,
    pub(crate) link: Option<Arc<SubprocessHandle>>,
}

/// State shared between the owner thread and the worker.
pub(crate) struct TranslateShared {
    pub(crate) id: String,
    pub(crate) queue: ChunkQueue,
    /// Held across launches so `abort` cannot miss a subprocess that is
    /// being started.
    pub(crate) subprocesses: Mutex<ActiveSubprocesses>,
    pub(crate) stats: Mutex<TimeStats>,
    aborted: AtomicBool,
    started: AtomicBool,
    running: AtomicBool,
}

impl TranslateShared {
    fn new() -> Self {
        Self {
            id: format!("T{}", cuid2::create_id()),
            queue: ChunkQueue::new(),
            subprocesses: Mutex::new(ActiveSubprocesses::default()),
            stats: Mutex::new(TimeStats::default()),
            aborted: AtomicBool::new(false),
            started: AtomicBool::new(false),
            running: AtomicBool::new(false),
        }
    }

    pub(crate) fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    pub(crate) fn release_compiler(&self) {
        let handle = self.subprocesses.lock().compile.take();
        if let Some(handle) = handle {
            handle.shutdown();
        }
    }

    pub(crate) fn release_linker(&self) {
        let handle = self.subprocesses.lock().link.take();
        if let Some(handle) = handle {
            handle.shutdown();
        }
    }

    fn shutdown_subprocesses(&self) {
        let active = self.subprocesses.lock();
        if let Some(handle) = &active.compile {
            handle.shutdown();
        }
        if let Some(handle) = &active.link {
            handle.shutdown();
        }
    }
}

/// Delivers the completion callback at most once.
struct CompletionSlot {
    callback: Mutex<Option<CompletionCallback>>,
    dispatcher: Arc<dyn CallbackDispatcher>,
    error_sink: ErrorSink,
}

impl CompletionSlot {
    fn fail(&self, id: &str, error: &TranslateError) {
        tracing::error!("[{}] Translation failed: {}", id, error);
        self.error_sink
            .set_report_if_empty(error.code(), error.to_string());
        self.complete(id, TranslateStatus::Failed);
    }

    fn complete(&self, id: &str, status: TranslateStatus) {
        let Some(callback) = self.callback.lock().take() else {
            tracing::debug!("[{}] Completion already delivered", id);
            return;
        };
        self.dispatcher.post(Box::new(move || callback(status)));
    }
}

/// Runs one translation at a time on a dedicated worker thread.
pub struct TranslatePipeline {
    shared: Arc<TranslateShared>,
    /// Serializes the reset in `start` against `abort`.
    lifecycle: Mutex<()>,
    worker: Mutex<Option<JoinHandle<()>>>,
    stack_size: usize,
}

impl TranslatePipeline {
    pub fn new() -> Self {
        Self::with_stack_size(DEFAULT_THREAD_STACK_SIZE)
    }

    pub fn with_stack_size(stack_size: usize) -> Self {
        Self {
            shared: Arc::new(TranslateShared::new()),
            lifecycle: Mutex::new(()),
            worker: Mutex::new(None),
            stack_size,
        }
    }

    pub fn from_config(config: &TranslateConfig) -> Self {
        Self::with_stack_size(config.thread_stack_size)
    }

    pub fn id(&self) -> &str {
        &self.shared.id
    }

    /// Start translating. Returns once the worker is running; the outcome
    /// arrives through the job's completion callback.
    ///
    /// A job that cannot be started at all is returned as an error and its
    /// callback is never invoked.
    pub fn start(&self, mut job: TranslateJob) -> Result<()> {
        let count = job.object_files.len();
        if count > MAX_OBJECT_FILES {
            return Err(TranslateError::TooManyObjectFiles {
                count,
                max: MAX_OBJECT_FILES,
            });
        }

        let shared = &self.shared;
        let _lifecycle = self.lifecycle.lock();
        if shared
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(TranslateError::AlreadyRunning);
        }

        let mut worker = self.worker.lock();
        if let Some(previous) = worker.take() {
            if previous.join().is_err() {
                tracing::warn!("[{}] Previous translate thread panicked", shared.id);
            }
        }

        if shared.queue.is_done() {
            shared.queue.reset();
        }
        shared.aborted.store(false, Ordering::Release);
        *shared.stats.lock() = TimeStats::default();
        *shared.subprocesses.lock() = ActiveSubprocesses::default();
        shared.started.store(true, Ordering::Release);

        let slot = Arc::new(CompletionSlot {
            callback: Mutex::new(job.on_complete.take()),
            dispatcher: Arc::clone(&job.dispatcher),
            error_sink: job.error_sink.clone(),
        });

        tracing::info!(
            "[{}] Starting translation ({} object files)",
            shared.id,
            count
        );

        let spawned = {
            let shared = Arc::clone(shared);
            let slot = Arc::clone(&slot);
            std::thread::Builder::new()
                .name(format!("xlate-{}", shared.id))
                .stack_size(self.stack_size)
                .spawn(move || run_translation(&shared, &job, &slot))
        };

        match spawned {
            Ok(handle) => {
                *worker = Some(handle);
            }
            Err(e) => {
                shared.running.store(false, Ordering::Release);
                shared.queue.abort();
                slot.fail(&shared.id, &TranslateError::ThreadCreate(e.to_string()));
            }
        }
        Ok(())
    }

    /// Queue a chunk of input for the compiler.
    pub fn feed(&self, bytes: Vec<u8>) -> bool {
        if bytes.is_empty() {
            tracing::trace!("[{}] Ignoring empty chunk", self.shared.id);
            return true;
        }
        self.shared.queue.push(bytes)
    }

    /// No more input. A second call is a no-op.
    pub fn finish(&self) -> bool {
        self.shared.queue.mark_done()
    }

    /// Combined feed/finish entry point: a `count` of zero or less means
    /// end of stream, otherwise exactly `count` bytes are queued (a short
    /// buffer is zero-padded).
    pub fn put_bytes(&self, mut bytes: Vec<u8>, count: i32) -> bool {
        if count <= 0 {
            return self.finish();
        }
        bytes.resize(count as usize, 0);
        self.feed(bytes)
    }

    /// Stop the translation from any thread.
    ///
    /// Shuts down whichever subprocess is live and wakes the worker. The
    /// resulting failure is reported through the normal completion path.
    pub fn abort(&self) {
        let shared = &self.shared;
        let _lifecycle = self.lifecycle.lock();
        if !shared.started.load(Ordering::Acquire) {
            tracing::debug!("[{}] Abort before start ignored", shared.id);
            return;
        }
        if shared.running.load(Ordering::Acquire) {
            tracing::info!("[{}] Aborting translation", shared.id);
            shared.aborted.store(true, Ordering::Release);
        }
        shared.shutdown_subprocesses();
        let dropped = shared.queue.abort();
        if dropped > 0 {
            tracing::debug!("[{}] Discarded {} buffered chunks", shared.id, dropped);
        }
    }

    pub fn stats(&self) -> TimeStats {
        self.shared.stats.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Wait for the worker thread to exit.
    pub fn join(&self) {
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::warn!("[{}] Translate thread panicked", self.shared.id);
            }
        }
    }
}

impl Default for TranslatePipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TranslatePipeline {
    fn drop(&mut self) {
        self.abort();
        self.join();
    }
}

fn run_translation(shared: &TranslateShared, job: &TranslateJob, slot: &CompletionSlot) {
    tracing::debug!("[{}] Translate thread started", shared.id);

    let result = run_stages(shared, job);

    shared.release_compiler();
    shared.release_linker();
    shared.queue.abort();
    shared.running.store(false, Ordering::Release);

    match result {
        Ok(()) => {
            tracing::info!("[{}] Translation succeeded", shared.id);
            slot.complete(&shared.id, TranslateStatus::Succeeded);
        }
        Err(e) => slot.fail(&shared.id, &e),
    }
    tracing::debug!("[{}] Translate thread stopped", shared.id);
}

fn run_stages(shared: &TranslateShared, job: &TranslateJob) -> Result<()> {
    let mut compile = CompileStage::new(shared, job);
    let compiled = compile.run();
    tracing::debug!("[{}] Compile stage ended {:?}", shared.id, compile.state());
    compiled?;

    let mut link = LinkStage::new(shared, job);
    let linked = link.run();
    tracing::debug!("[{}] Link stage ended {:?}", shared.id, link.state());
    linked
}
