// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Subprocess side of the RPC protocol.

use std::io::{self, BufReader, BufWriter, Read, Write};

use super::framing::{read_frame, write_frame};
use super::rpc::{RpcFailure, RpcReply, RpcRequest};

/// Implemented by stage programs (compiler/linker) to answer host calls.
pub trait RpcHandler {
    fn handle(&mut self, request: RpcRequest) -> RpcReply;
}

/// Answer requests from `reader` on `writer` until the host closes the stream.
///
/// Requests whose arguments do not match the method signature are answered
/// with an application error instead of reaching the handler. Returns the
/// number of requests served.
pub fn serve<R, W, H>(reader: R, writer: W, handler: &mut H) -> io::Result<usize>
where
    R: Read,
    W: Write,
    H: RpcHandler + ?Sized,
{
    let mut reader = BufReader::new(reader);
    let mut writer = BufWriter::new(writer);
    let mut served = 0;

    loop {
        let request: RpcRequest = match read_frame(&mut reader) {
            Ok(request) => request,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(served),
            Err(e) => return Err(e),
        };

        let reply = match request.validate() {
            Ok(()) => handler.handle(request),
            Err(RpcFailure::Transport { reason } | RpcFailure::Application { message: reason }) => {
                RpcReply::AppError { message: reason }
            }
        };

        write_frame(&mut writer, &reply)?;
        served += 1;
    }
}
