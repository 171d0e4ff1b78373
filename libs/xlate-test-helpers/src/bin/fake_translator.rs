// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Stand-in compiler/linker for end-to-end tests.
//!
//! Compile stage: buffers the streamed input and at `StreamEnd` splits it
//! into contiguous pieces, one per object file. Input containing
//! `#error <msg>` fails `StreamEnd` with `<msg>`; `#reject` fails the chunk
//! that carries it; `#crash` exits mid-chunk.
//!
//! Link stage: concatenates the object files (after the manifest's `crt0`
//! entry, if any) into the output.

use std::io::Write;
use std::path::PathBuf;

use xlate::core::host::{ENV_MANIFEST, ENV_STAGE};
use xlate::core::wire::{RpcHandler, serve};
use xlate::{Access, Descriptor, MAX_OBJECT_FILES, Manifest, RpcArg, RpcMethod, RpcReply, RpcRequest};

fn app_error(message: impl Into<String>) -> RpcReply {
    RpcReply::AppError {
        message: message.into(),
    }
}

/// Validate the `(int, handle x16)` prefix shared by both stages and
/// return the paths of the real slots.
fn object_paths(args: &[RpcArg], access: Access) -> Result<Vec<PathBuf>, String> {
    let count = match args.first() {
        Some(RpcArg::Int(n)) if *n >= 0 && (*n as usize) <= MAX_OBJECT_FILES => *n as usize,
        other => return Err(format!("bad object count {:?}", other)),
    };

    let mut paths = Vec::with_capacity(count);
    for (i, arg) in args[1..=MAX_OBJECT_FILES].iter().enumerate() {
        match (arg, i < count) {
            (
                RpcArg::Handle(Descriptor::File {
                    path, access: a, ..
                }),
                true,
            ) if *a == access => paths.push(path.clone()),
            (RpcArg::Handle(Descriptor::Invalid), false) => {}
            (other, _) => return Err(format!("bad descriptor in slot {}: {:?}", i, other)),
        }
    }
    Ok(paths)
}

#[derive(Default)]
struct Compiler {
    outputs: Vec<PathBuf>,
    input: Vec<u8>,
    rejected: bool,
}

impl Compiler {
    fn init(&mut self, args: &[RpcArg]) -> RpcReply {
        let outputs = match object_paths(args, Access::Write) {
            Ok(paths) => paths,
            Err(e) => return app_error(e),
        };
        let expected = format!("-split-module={}\0", outputs.len());
        match args.last() {
            Some(RpcArg::Bytes(options)) if options.starts_with(expected.as_bytes()) => {}
            _ => return app_error("missing -split-module option"),
        }
        self.outputs = outputs;
        RpcReply::Ok
    }

    fn chunk(&mut self, bytes: &[u8]) -> RpcReply {
        if contains(bytes, b"#crash") {
            std::process::exit(3);
        }
        if contains(bytes, b"#reject") {
            self.rejected = true;
            return app_error("chunk rejected");
        }
        self.input.extend_from_slice(bytes);
        RpcReply::Ok
    }

    fn end(&mut self) -> RpcReply {
        if self.rejected {
            return app_error("input contained a rejected chunk");
        }
        if let Some(pos) = find(&self.input, b"#error ") {
            let rest = &self.input[pos + 7..];
            let end = rest.iter().position(|b| *b == b'\n').unwrap_or(rest.len());
            return app_error(String::from_utf8_lossy(&rest[..end]).into_owned());
        }
        if self.outputs.is_empty() {
            return app_error("no object files");
        }

        let per_file = self.input.len().div_ceil(self.outputs.len()).max(1);
        let mut pieces = self.input.chunks(per_file);
        for path in &self.outputs {
            let piece = pieces.next().unwrap_or(&[]);
            if let Err(e) = std::fs::write(path, piece) {
                return app_error(format!("{}: {}", path.display(), e));
            }
        }
        RpcReply::Ok
    }
}

impl RpcHandler for Compiler {
    fn handle(&mut self, request: RpcRequest) -> RpcReply {
        match request.method {
            RpcMethod::StreamInitWithSplit => self.init(&request.args),
            RpcMethod::StreamChunk => match request.args.first() {
                Some(RpcArg::Bytes(bytes)) => self.chunk(bytes),
                _ => app_error("StreamChunk without bytes"),
            },
            RpcMethod::StreamEnd => self.end(),
            RpcMethod::RunWithSplit => app_error("compiler cannot link"),
        }
    }
}

struct Linker {
    manifest: Manifest,
}

impl Linker {
    fn run(&self, args: &[RpcArg]) -> Result<(), String> {
        let inputs = object_paths(args, Access::Read)?;
        if inputs.is_empty() {
            return Err("no object files".to_string());
        }
        let output = match args.last() {
            Some(RpcArg::Handle(Descriptor::File {
                path,
                access: Access::Write,
                ..
            })) => path.clone(),
            other => return Err(format!("bad output descriptor {:?}", other)),
        };

        let mut linked = Vec::new();
        if let Some(crt0) = self.manifest.resolve("crt0") {
            linked.extend(std::fs::read(crt0).map_err(|e| format!("crt0: {}", e))?);
        }
        for path in &inputs {
            linked.extend(std::fs::read(path).map_err(|e| format!("{}: {}", path.display(), e))?);
        }
        std::fs::write(&output, linked).map_err(|e| format!("{}: {}", output.display(), e))
    }
}

impl RpcHandler for Linker {
    fn handle(&mut self, request: RpcRequest) -> RpcReply {
        match request.method {
            RpcMethod::RunWithSplit => match self.run(&request.args) {
                Ok(()) => RpcReply::Ok,
                Err(e) => app_error(e),
            },
            other => app_error(format!("linker does not implement {}", other)),
        }
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    find(haystack, needle).is_some()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn main() {
    let stage = std::env::var(ENV_STAGE).unwrap_or_default();
    let manifest: Manifest = std::env::var(ENV_MANIFEST)
        .ok()
        .and_then(|json| serde_json::from_str(&json).ok())
        .unwrap_or_default();

    let stdin = std::io::stdin().lock();
    let stdout = std::io::stdout().lock();

    let result = match stage.as_str() {
        "compile" => serve(stdin, stdout, &mut Compiler::default()),
        "link" => serve(stdin, stdout, &mut Linker { manifest }),
        other => {
            let _ = writeln!(std::io::stderr(), "unknown stage '{}'", other);
            std::process::exit(2);
        }
    };

    if let Err(e) = result {
        let _ = writeln!(std::io::stderr(), "{} stage: {}", stage, e);
        std::process::exit(1);
    }
}
