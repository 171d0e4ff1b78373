// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Length-prefixed MessagePack frames.

use std::io::{self, Read, Write};

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Largest accepted frame body. A chunk larger than this is a caller bug.
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Serialize `message` and write it as one frame, then flush.
pub fn write_frame<W: Write, T: Serialize>(writer: &mut W, message: &T) -> io::Result<()> {
    let body = rmp_serde::to_vec_named(message)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    if body.len() > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "frame of {} bytes exceeds limit of {}",
                body.len(),
                MAX_FRAME_LEN
            ),
        ));
    }

    writer.write_all(&(body.len() as u32).to_be_bytes())?;
    writer.write_all(&body)?;
    writer.flush()
}

/// Read one frame and deserialize it.
///
/// A clean end of stream before the length prefix surfaces as
/// [`io::ErrorKind::UnexpectedEof`].
pub fn read_frame<R: Read, T: DeserializeOwned>(reader: &mut R) -> io::Result<T> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame length {} exceeds limit of {}", len, MAX_FRAME_LEN),
        ));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body)?;

    rmp_serde::from_slice(&body).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::wire::{Access, Descriptor, RpcArg, RpcMethod, RpcReply, RpcRequest};
    use std::io::Cursor;
    use std::path::PathBuf;

    #[test]
    fn test_request_survives_framing() {
        let request = RpcRequest::new(
            RpcMethod::RunWithSplit,
            std::iter::once(RpcArg::Int(1))
                .chain(
                    crate::core::wire::pad_descriptors(&[Descriptor::File {
                        id: "obj0".to_string(),
                        path: PathBuf::from("/tmp/obj0"),
                        access: Access::Read,
                    }])
                    .into_iter()
                    .map(RpcArg::Handle),
                )
                .chain(std::iter::once(RpcArg::Handle(Descriptor::Invalid)))
                .collect(),
        )
        .unwrap();

        let mut buf = Vec::new();
        write_frame(&mut buf, &request).unwrap();
        let decoded: RpcRequest = read_frame(&mut Cursor::new(buf)).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_consecutive_frames() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &RpcReply::Ok).unwrap();
        write_frame(
            &mut buf,
            &RpcReply::AppError {
                message: "bad bitcode".to_string(),
            },
        )
        .unwrap();

        let mut cursor = Cursor::new(buf);
        assert_eq!(read_frame::<_, RpcReply>(&mut cursor).unwrap(), RpcReply::Ok);
        assert!(matches!(
            read_frame::<_, RpcReply>(&mut cursor).unwrap(),
            RpcReply::AppError { message } if message == "bad bitcode"
        ));
        let eof = read_frame::<_, RpcReply>(&mut cursor).unwrap_err();
        assert_eq!(eof.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_oversized_length_rejected() {
        let mut buf = ((MAX_FRAME_LEN + 1) as u32).to_be_bytes().to_vec();
        buf.extend_from_slice(&[0; 8]);
        let err = read_frame::<_, RpcReply>(&mut Cursor::new(buf)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_truncated_body_is_eof() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &RpcReply::Ok).unwrap();
        buf.truncate(buf.len() - 1);
        let err = read_frame::<_, RpcReply>(&mut Cursor::new(buf)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
