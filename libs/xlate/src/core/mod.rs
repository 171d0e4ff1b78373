// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

pub mod config;
pub mod dispatch;
pub mod error;
pub mod error_sink;
pub mod host;
pub mod options;
pub mod queue;
pub mod subprocess;
pub mod translate;
pub mod wire;

pub use config::TranslateConfig;
pub use dispatch::{CallbackDispatcher, DispatcherHandle, MainThreadDispatcher, Task};
pub use error::{ErrorCode, Result, TranslateError};
pub use error_sink::{ErrorReport, ErrorSink};
pub use host::{
    LaunchRequest, LocalResources, LocalTempFile, Manifest, ProcessHost, ResourceProvider,
    RpcTransport, SubprocessHost, TempFile,
};
pub use options::TranslateOptions;
pub use queue::{ChunkPop, ChunkQueue};
pub use subprocess::{Stage, SubprocessHandle};
pub use translate::{
    CompletionCallback, ProgressCallback, TimeStats, TranslateJob, TranslatePipeline,
    TranslateStatus,
};
pub use wire::{
    Access, Descriptor, MAX_OBJECT_FILES, RpcArg, RpcFailure, RpcMethod, RpcReply, RpcRequest,
};
