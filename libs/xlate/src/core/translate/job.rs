// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::sync::Arc;

use crate::core::dispatch::CallbackDispatcher;
use crate::core::error_sink::ErrorSink;
use crate::core::host::{Manifest, ResourceProvider, SubprocessHost, TempFile};
use crate::core::options::TranslateOptions;

/// Overall outcome handed to the completion callback. Details live in the
/// job's [`ErrorSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslateStatus {
    Succeeded,
    Failed,
}

impl TranslateStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// Runs once on the originating thread when a translation ends.
pub type CompletionCallback = Box<dyn FnOnce(TranslateStatus) + Send + 'static>;

/// Receives the size of every chunk the compiler accepted.
pub type ProgressCallback = Arc<dyn Fn(usize) + Send + Sync + 'static>;

/// Everything one translation needs.
pub struct TranslateJob {
    pub(crate) object_files: Vec<Arc<dyn TempFile>>,
    pub(crate) output: Arc<dyn TempFile>,
    pub(crate) options: TranslateOptions,
    pub(crate) manifest: Manifest,
    pub(crate) error_sink: ErrorSink,
    pub(crate) resources: Arc<dyn ResourceProvider>,
    pub(crate) host: Arc<dyn SubprocessHost>,
    pub(crate) dispatcher: Arc<dyn CallbackDispatcher>,
    pub(crate) progress: Option<ProgressCallback>,
    pub(crate) on_complete: Option<CompletionCallback>,
}

impl TranslateJob {
    pub fn new(
        resources: Arc<dyn ResourceProvider>,
        host: Arc<dyn SubprocessHost>,
        dispatcher: Arc<dyn CallbackDispatcher>,
        output: Arc<dyn TempFile>,
    ) -> Self {
        Self {
            object_files: Vec::new(),
            output,
            options: TranslateOptions::default(),
            manifest: Manifest::default(),
            error_sink: ErrorSink::new(),
            resources,
            host,
            dispatcher,
            progress: None,
            on_complete: None,
        }
    }

    /// Intermediate object files, one per compiler output module.
    pub fn with_object_files(mut self, files: Vec<Arc<dyn TempFile>>) -> Self {
        self.object_files = files;
        self
    }

    pub fn with_object_file(mut self, file: Arc<dyn TempFile>) -> Self {
        self.object_files.push(file);
        self
    }

    pub fn with_options(mut self, options: TranslateOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_manifest(mut self, manifest: Manifest) -> Self {
        self.manifest = manifest;
        self
    }

    /// Share an existing sink, e.g. one the caller may already have written
    /// a load error into.
    pub fn with_error_sink(mut self, sink: ErrorSink) -> Self {
        self.error_sink = sink;
        self
    }

    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(callback));
        self
    }

    pub fn with_completion<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(TranslateStatus) + Send + 'static,
    {
        self.on_complete = Some(Box::new(callback));
        self
    }

    pub fn error_sink(&self) -> &ErrorSink {
        &self.error_sink
    }

    pub fn object_file_count(&self) -> usize {
        self.object_files.len()
    }
}
