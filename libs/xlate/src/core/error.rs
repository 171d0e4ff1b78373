// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use thiserror::Error;

/// Enumerated cause recorded alongside a failure message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    SubprocessLaunch,
    CompileSetup,
    CompileInternal,
    CompileRemote,
    LinkSetup,
    LinkInternal,
    ThreadCreate,
    Aborted,
    /// The request was rejected before any work started.
    InvalidRequest,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SubprocessLaunch => "subprocess_launch",
            Self::CompileSetup => "compile_setup",
            Self::CompileInternal => "compile_internal",
            Self::CompileRemote => "compile_remote",
            Self::LinkSetup => "link_setup",
            Self::LinkInternal => "link_internal",
            Self::ThreadCreate => "thread_create",
            Self::Aborted => "aborted",
            Self::InvalidRequest => "invalid_request",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum TranslateError {
    #[error("Subprocess '{url}' could not be launched: {message}")]
    SubprocessLaunch { url: String, message: String },

    #[error("{0}")]
    CompileSetup(String),

    #[error("{0}")]
    CompileInternal(String),

    /// Failure reported by the compiler itself; the message is passed through untouched.
    #[error("{0}")]
    CompileRemote(String),

    #[error("{0}")]
    LinkSetup(String),

    #[error("{0}")]
    LinkInternal(String),

    #[error("Could not create translate thread: {0}")]
    ThreadCreate(String),

    #[error("Translation aborted")]
    Aborted,

    #[error("A translation is already in progress")]
    AlreadyRunning,

    #[error("Too many object files: {count} (protocol maximum is {max})")]
    TooManyObjectFiles { count: usize, max: usize },

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TranslateError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::SubprocessLaunch { .. } => ErrorCode::SubprocessLaunch,
            Self::CompileSetup(_) => ErrorCode::CompileSetup,
            Self::CompileInternal(_) => ErrorCode::CompileInternal,
            Self::CompileRemote(_) => ErrorCode::CompileRemote,
            Self::LinkSetup(_) => ErrorCode::LinkSetup,
            Self::LinkInternal(_) => ErrorCode::LinkInternal,
            Self::ThreadCreate(_) => ErrorCode::ThreadCreate,
            Self::Aborted => ErrorCode::Aborted,
            Self::AlreadyRunning
            | Self::TooManyObjectFiles { .. }
            | Self::Configuration(_)
            | Self::Io(_) => ErrorCode::InvalidRequest,
        }
    }
}

pub type Result<T> = std::result::Result<T, TranslateError>;
