// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::descriptor::Descriptor;

/// Remote procedures exposed by the stage subprocesses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RpcMethod {
    /// Compiler: `(int object_count, handle x16, bytes options)`.
    StreamInitWithSplit,
    /// Compiler: `(bytes chunk)`.
    StreamChunk,
    /// Compiler: `()`.
    StreamEnd,
    /// Linker: `(int object_count, handle x16 read, handle write)`.
    RunWithSplit,
}

impl RpcMethod {
    pub fn name(&self) -> &'static str {
        match self {
            Self::StreamInitWithSplit => "StreamInitWithSplit",
            Self::StreamChunk => "StreamChunk",
            Self::StreamEnd => "StreamEnd",
            Self::RunWithSplit => "RunWithSplit",
        }
    }

    /// Argument type string: `i` int, `h` handle, `C` byte array.
    pub fn signature(&self) -> &'static str {
        match self {
            Self::StreamInitWithSplit => "ihhhhhhhhhhhhhhhhC",
            Self::StreamChunk => "C",
            Self::StreamEnd => "",
            Self::RunWithSplit => "ihhhhhhhhhhhhhhhhh",
        }
    }
}

impl std::fmt::Display for RpcMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RpcArg {
    Int(i32),
    Handle(Descriptor),
    Bytes(Vec<u8>),
}

impl RpcArg {
    pub fn type_code(&self) -> char {
        match self {
            Self::Int(_) => 'i',
            Self::Handle(_) => 'h',
            Self::Bytes(_) => 'C',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub method: RpcMethod,
    pub args: Vec<RpcArg>,
}

impl RpcRequest {
    /// Build a request, rejecting arguments that do not match the method signature.
    pub fn new(method: RpcMethod, args: Vec<RpcArg>) -> Result<Self, RpcFailure> {
        let request = Self { method, args };
        request.validate()?;
        Ok(request)
    }

    pub fn signature(&self) -> String {
        self.args.iter().map(RpcArg::type_code).collect()
    }

    pub fn validate(&self) -> Result<(), RpcFailure> {
        let actual = self.signature();
        if actual != self.method.signature() {
            return Err(RpcFailure::Transport {
                reason: format!(
                    "{} expects signature '{}', got '{}'",
                    self.method,
                    self.method.signature(),
                    actual
                ),
            });
        }
        Ok(())
    }

    /// All handle arguments in order.
    pub fn handles(&self) -> impl Iterator<Item = &Descriptor> {
        self.args.iter().filter_map(|arg| match arg {
            RpcArg::Handle(d) => Some(d),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RpcReply {
    Ok,
    /// The subprocess ran the call and reported a failure of its own.
    AppError { message: String },
}

/// Why a blocking call did not succeed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RpcFailure {
    /// The subprocess reported an application-level error.
    #[error("remote error: {message}")]
    Application { message: String },

    /// The subprocess crashed, was shut down, or violated the protocol.
    /// No remote message is available.
    #[error("transport error: {reason}")]
    Transport { reason: String },
}

impl RpcFailure {
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    pub fn is_application(&self) -> bool {
        matches!(self, Self::Application { .. })
    }
}
