// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Streaming ahead-of-time translation.
//!
//! A producer thread feeds bitcode into a [`TranslatePipeline`]. A dedicated
//! worker thread streams the bytes into a compiler subprocess, which splits
//! its output across up to [`MAX_OBJECT_FILES`] object files, then runs a
//! linker subprocess that combines them into the final artifact. Completion
//! is reported exactly once through a [`CallbackDispatcher`], so the callback
//! runs on whichever thread owns the dispatcher.

pub mod core;

pub use crate::core::{
    Access, CallbackDispatcher, ChunkPop, ChunkQueue, CompletionCallback, Descriptor,
    DispatcherHandle, ErrorCode, ErrorReport, ErrorSink, LaunchRequest, LocalResources,
    LocalTempFile, MAX_OBJECT_FILES, MainThreadDispatcher, Manifest, ProcessHost,
    ProgressCallback, ResourceProvider, Result, RpcArg, RpcFailure, RpcMethod, RpcReply,
    RpcRequest, RpcTransport, Stage, SubprocessHandle, SubprocessHost, Task, TempFile,
    TimeStats, TranslateConfig, TranslateError, TranslateJob, TranslateOptions,
    TranslatePipeline, TranslateStatus,
};
