// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Wire contract between the translate thread and the stage subprocesses.
//!
//! Frames are a 4-byte big-endian length followed by a MessagePack body.
//! The host sends one [`RpcRequest`] and blocks until the matching
//! [`RpcReply`] arrives; there is never more than one call in flight per
//! subprocess.

mod descriptor;
mod framing;
mod rpc;
mod server;

pub use descriptor::{Access, Descriptor, MAX_OBJECT_FILES, pad_descriptors};
pub use framing::{MAX_FRAME_LEN, read_frame, write_frame};
pub use rpc::{RpcArg, RpcFailure, RpcMethod, RpcReply, RpcRequest};
pub use server::{RpcHandler, serve};
