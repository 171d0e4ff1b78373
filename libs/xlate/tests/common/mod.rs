// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Scripted collaborators shared by the pipeline integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use xlate::{
    Access, Descriptor, ErrorSink, LaunchRequest, MainThreadDispatcher, ResourceProvider,
    RpcFailure, RpcMethod, RpcReply, RpcRequest, RpcTransport, Stage, SubprocessHost, TempFile,
    TranslateJob, TranslatePipeline, TranslateStatus,
};

pub const WAIT_LIMIT: Duration = Duration::from_secs(10);

pub struct StaticResources;

impl ResourceProvider for StaticResources {
    fn compiler_url(&self) -> String {
        "llc.nexe".to_string()
    }

    fn linker_url(&self) -> String {
        "ld.nexe".to_string()
    }

    fn full_url(&self, url: &str, sandbox_arch: &str) -> String {
        format!("scripted://{}/{}", sandbox_arch, url)
    }

    fn locate(&self, _url: &str) -> Option<PathBuf> {
        None
    }
}

/// Temp file that lives only as descriptors.
pub struct MemTempFile {
    id: String,
    fail_reset: bool,
    pub resets: AtomicUsize,
}

impl MemTempFile {
    pub fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            fail_reset: false,
            resets: AtomicUsize::new(0),
        })
    }

    pub fn failing_reset(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            fail_reset: true,
            resets: AtomicUsize::new(0),
        })
    }

    fn handle(&self, access: Access) -> Descriptor {
        Descriptor::File {
            id: self.id.clone(),
            path: PathBuf::from(format!("/mem/{}", self.id)),
            access,
        }
    }
}

impl TempFile for MemTempFile {
    fn identifier(&self) -> &str {
        &self.id
    }

    fn read_handle(&self) -> Descriptor {
        self.handle(Access::Read)
    }

    fn write_handle(&self) -> Descriptor {
        self.handle(Access::Write)
    }

    fn reset_for_read(&self) -> std::io::Result<()> {
        self.resets.fetch_add(1, Ordering::SeqCst);
        if self.fail_reset {
            return Err(std::io::Error::other("descriptor revoked"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub enum Scripted {
    AppError(String),
    Transport,
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub stage: Stage,
    pub request: RpcRequest,
}

#[derive(Default)]
struct Script {
    fail_launch: HashMap<Stage, String>,
    replies: HashMap<RpcMethod, Scripted>,
    /// Fail only the n-th (0-based) StreamChunk.
    fail_chunk_at: Option<(usize, Scripted)>,
    block_chunks: bool,
    block_link: bool,
}

#[derive(Default)]
struct Counters {
    launches: HashMap<Stage, usize>,
    live: usize,
    peak_live: usize,
}

/// Host whose subprocesses answer from a script and record every call.
#[derive(Default)]
pub struct ScriptedHost {
    script: Mutex<Script>,
    counters: Arc<Mutex<Counters>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    chunk_calls: Arc<AtomicUsize>,
}

impl ScriptedHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_launch(&self, stage: Stage, message: &str) {
        self.script
            .lock()
            .fail_launch
            .insert(stage, message.to_string());
    }

    pub fn reply(&self, method: RpcMethod, scripted: Scripted) {
        self.script.lock().replies.insert(method, scripted);
    }

    pub fn fail_chunk_at(&self, index: usize, scripted: Scripted) {
        self.script.lock().fail_chunk_at = Some((index, scripted));
    }

    /// Make every StreamChunk block until the subprocess is closed.
    pub fn block_chunks(&self) {
        self.script.lock().block_chunks = true;
    }

    /// Make RunWithSplit block until the linker is closed.
    pub fn block_link(&self) {
        self.script.lock().block_link = true;
    }

    pub fn launches(&self, stage: Stage) -> usize {
        self.counters
            .lock()
            .launches
            .get(&stage)
            .copied()
            .unwrap_or(0)
    }

    pub fn live(&self) -> usize {
        self.counters.lock().live
    }

    pub fn peak_live(&self) -> usize {
        self.counters.lock().peak_live
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn methods(&self) -> Vec<(Stage, RpcMethod)> {
        self.calls
            .lock()
            .iter()
            .map(|c| (c.stage, c.request.method))
            .collect()
    }

    pub fn streamed_bytes(&self) -> Vec<u8> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.request.method == RpcMethod::StreamChunk)
            .flat_map(|c| match c.request.args.first() {
                Some(xlate::RpcArg::Bytes(bytes)) => bytes.clone(),
                _ => Vec::new(),
            })
            .collect()
    }

    /// Wait until `method` has been issued to the `stage` subprocess.
    pub fn wait_for_call(&self, stage: Stage, method: RpcMethod) {
        let deadline = Instant::now() + WAIT_LIMIT;
        while !self.methods().contains(&(stage, method)) {
            assert!(Instant::now() < deadline, "timed out waiting for {}", method);
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    /// Wait until `n` StreamChunk calls have been issued.
    pub fn wait_for_chunk_calls(&self, n: usize) {
        let deadline = Instant::now() + WAIT_LIMIT;
        while self.chunk_calls.load(Ordering::SeqCst) < n {
            assert!(Instant::now() < deadline, "timed out waiting for StreamChunk");
            std::thread::sleep(Duration::from_millis(1));
        }
    }
}

impl SubprocessHost for ScriptedHost {
    fn sandbox_arch(&self) -> String {
        "x86-64".to_string()
    }

    fn launch(&self, request: &LaunchRequest<'_>) -> Result<Box<dyn RpcTransport>, String> {
        let script = self.script.lock();
        if let Some(message) = script.fail_launch.get(&request.stage) {
            return Err(message.clone());
        }

        let mut counters = self.counters.lock();
        *counters.launches.entry(request.stage).or_insert(0) += 1;
        counters.live += 1;
        counters.peak_live = counters.peak_live.max(counters.live);

        let replies = match request.stage {
            Stage::Compile => script.replies.clone(),
            Stage::Link => script
                .replies
                .iter()
                .filter(|(m, _)| **m == RpcMethod::RunWithSplit)
                .map(|(m, s)| (*m, s.clone()))
                .collect(),
        };

        Ok(Box::new(ScriptedTransport {
            stage: request.stage,
            replies,
            fail_chunk_at: script.fail_chunk_at.clone(),
            block_chunks: script.block_chunks,
            block_link: script.block_link,
            chunks_seen: AtomicUsize::new(0),
            closed: Mutex::new(false),
            closed_cond: Condvar::new(),
            counted_close: AtomicBool::new(false),
            calls: Arc::clone(&self.calls),
            chunk_calls: Arc::clone(&self.chunk_calls),
            counters: Arc::clone(&self.counters),
        }))
    }
}

pub struct ScriptedTransport {
    stage: Stage,
    replies: HashMap<RpcMethod, Scripted>,
    fail_chunk_at: Option<(usize, Scripted)>,
    block_chunks: bool,
    block_link: bool,
    chunks_seen: AtomicUsize,
    closed: Mutex<bool>,
    closed_cond: Condvar,
    counted_close: AtomicBool,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    chunk_calls: Arc<AtomicUsize>,
    counters: Arc<Mutex<Counters>>,
}

impl ScriptedTransport {
    fn block_until_closed(&self) -> Result<RpcReply, RpcFailure> {
        let mut closed = self.closed.lock();
        while !*closed {
            self.closed_cond.wait(&mut closed);
        }
        Err(RpcFailure::transport("closed while blocked"))
    }

    fn answer(scripted: &Scripted) -> Result<RpcReply, RpcFailure> {
        match scripted {
            Scripted::AppError(message) => Ok(RpcReply::AppError {
                message: message.clone(),
            }),
            Scripted::Transport => Err(RpcFailure::transport("scripted crash")),
        }
    }
}

impl RpcTransport for ScriptedTransport {
    fn call(&self, request: &RpcRequest) -> Result<RpcReply, RpcFailure> {
        if *self.closed.lock() {
            return Err(RpcFailure::transport("closed"));
        }
        self.calls.lock().push(RecordedCall {
            stage: self.stage,
            request: request.clone(),
        });

        if request.method == RpcMethod::StreamChunk {
            let index = self.chunks_seen.fetch_add(1, Ordering::SeqCst);
            self.chunk_calls.fetch_add(1, Ordering::SeqCst);

            if self.block_chunks {
                return self.block_until_closed();
            }
            if let Some((at, scripted)) = &self.fail_chunk_at {
                if *at == index {
                    return Self::answer(scripted);
                }
            }
        }

        if request.method == RpcMethod::RunWithSplit && self.block_link {
            return self.block_until_closed();
        }

        match self.replies.get(&request.method) {
            Some(scripted) => Self::answer(scripted),
            None => Ok(RpcReply::Ok),
        }
    }

    fn close(&self) {
        *self.closed.lock() = true;
        self.closed_cond.notify_all();
        if !self.counted_close.swap(true, Ordering::SeqCst) {
            self.counters.lock().live -= 1;
        }
    }
}

/// One pipeline wired to scripted collaborators, driven from the test thread.
pub struct Harness {
    pub pipeline: TranslatePipeline,
    pub dispatcher: MainThreadDispatcher,
    pub host: Arc<ScriptedHost>,
    pub sink: ErrorSink,
    pub output: Arc<MemTempFile>,
    pub statuses: Arc<Mutex<Vec<TranslateStatus>>>,
    pub progress: Arc<Mutex<Vec<usize>>>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            pipeline: TranslatePipeline::new(),
            dispatcher: MainThreadDispatcher::new(),
            host: ScriptedHost::new(),
            sink: ErrorSink::new(),
            output: MemTempFile::new("nexe"),
            statuses: Arc::new(Mutex::new(Vec::new())),
            progress: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Job with `objects` in-memory object files and recording callbacks.
    pub fn job(&self, objects: usize) -> TranslateJob {
        let files: Vec<Arc<dyn TempFile>> = (0..objects)
            .map(|i| MemTempFile::new(&format!("obj{}", i)) as Arc<dyn TempFile>)
            .collect();
        self.job_with_files(files)
    }

    pub fn job_with_files(&self, files: Vec<Arc<dyn TempFile>>) -> TranslateJob {
        let statuses = Arc::clone(&self.statuses);
        let progress = Arc::clone(&self.progress);
        TranslateJob::new(
            Arc::new(StaticResources),
            Arc::clone(&self.host) as Arc<dyn SubprocessHost>,
            Arc::new(self.dispatcher.handle()),
            Arc::clone(&self.output) as Arc<dyn TempFile>,
        )
        .with_object_files(files)
        .with_error_sink(self.sink.clone())
        .with_progress(move |len| progress.lock().push(len))
        .with_completion(move |status| statuses.lock().push(status))
    }

    /// Run dispatched callbacks until the completion callback has fired.
    pub fn wait(&self) -> TranslateStatus {
        let deadline = Instant::now() + WAIT_LIMIT;
        loop {
            if let Some(status) = self.statuses.lock().first().copied() {
                return status;
            }
            assert!(Instant::now() < deadline, "translation never completed");
            self.dispatcher.run_once(Duration::from_millis(5));
        }
    }

    /// Run dispatched callbacks until `n` progress notifications arrived.
    pub fn wait_for_progress(&self, n: usize) {
        let deadline = Instant::now() + WAIT_LIMIT;
        while self.progress.lock().len() < n {
            assert!(Instant::now() < deadline, "timed out waiting for progress");
            self.dispatcher.run_once(Duration::from_millis(5));
        }
    }

    /// Join the worker, drain anything still queued, and return every
    /// completion status delivered.
    pub fn settle(&self) -> Vec<TranslateStatus> {
        self.pipeline.join();
        self.dispatcher.run_pending();
        self.statuses.lock().clone()
    }

    pub fn message(&self) -> Option<String> {
        self.sink.message()
    }
}
