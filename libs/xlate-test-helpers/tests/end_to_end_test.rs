// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Full translations through real child processes running the fake
//! translator binary.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use xlate::{
    ErrorCode, ErrorSink, LocalResources, LocalTempFile, MainThreadDispatcher, Manifest,
    ProcessHost, TempFile, TranslateJob, TranslateOptions, TranslatePipeline, TranslateStatus,
};

const FAKE_TRANSLATOR: &str = env!("CARGO_BIN_EXE_xlate-fake-translator");

struct Run {
    status: TranslateStatus,
    sink: ErrorSink,
    output: Option<Vec<u8>>,
    progress: usize,
}

fn translate(
    dir: &Path,
    program: &Path,
    objects: usize,
    manifest: Manifest,
    chunks: &[&[u8]],
) -> Run {
    let dispatcher = MainThreadDispatcher::new();
    let pipeline = TranslatePipeline::new();
    let sink = ErrorSink::new();

    let files: Vec<Arc<dyn TempFile>> = (0..objects)
        .map(|_| Arc::new(LocalTempFile::new_in(dir).unwrap()) as Arc<dyn TempFile>)
        .collect();
    let output = Arc::new(LocalTempFile::new_in(dir).unwrap());

    let status = Arc::new(Mutex::new(None));
    let progress = Arc::new(Mutex::new(0usize));

    let job = TranslateJob::new(
        Arc::new(LocalResources::new(program, program)),
        Arc::new(ProcessHost::new("x86-64")),
        Arc::new(dispatcher.handle()),
        Arc::clone(&output) as Arc<dyn TempFile>,
    )
    .with_object_files(files)
    .with_options(TranslateOptions::default().with_opt_level(0))
    .with_manifest(manifest)
    .with_error_sink(sink.clone())
    .with_progress({
        let progress = Arc::clone(&progress);
        move |len| *progress.lock() += len
    })
    .with_completion({
        let status = Arc::clone(&status);
        move |s| *status.lock() = Some(s)
    });

    pipeline.start(job).unwrap();
    for chunk in chunks {
        pipeline.feed(chunk.to_vec());
    }
    pipeline.finish();

    let deadline = Instant::now() + Duration::from_secs(30);
    let status_ref = Arc::clone(&status);
    while status_ref.lock().is_none() {
        assert!(Instant::now() < deadline, "translation never completed");
        dispatcher.run_once(Duration::from_millis(10));
    }
    pipeline.join();
    dispatcher.run_pending();

    let status = status.lock().unwrap();
    let output = if status.is_success() {
        let dest = dir.join("out.nexe");
        output.persist_copy(&dest).unwrap();
        Some(std::fs::read(dest).unwrap())
    } else {
        None
    };
    let progress = *progress.lock();

    Run {
        status,
        sink,
        output,
        progress,
    }
}

fn fake() -> PathBuf {
    PathBuf::from(FAKE_TRANSLATOR)
}

#[test]
fn test_translate_through_processes() {
    let dir = tempfile::tempdir().unwrap();
    let input: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
    let chunks: Vec<&[u8]> = input.chunks(1024).collect();

    let run = translate(dir.path(), &fake(), 3, Manifest::new(), &chunks);

    assert_eq!(run.status, TranslateStatus::Succeeded, "{:?}", run.sink.report());
    assert_eq!(run.output.unwrap(), input);
    assert_eq!(run.progress, input.len());
}

#[test]
fn test_manifest_reaches_linker() {
    let dir = tempfile::tempdir().unwrap();
    let crt0 = dir.path().join("crt0.o");
    std::fs::write(&crt0, b"CRT0").unwrap();

    let run = translate(
        dir.path(),
        &fake(),
        1,
        Manifest::new().with_file("crt0", &crt0),
        &[b"body".as_slice()],
    );

    assert_eq!(run.status, TranslateStatus::Succeeded);
    assert_eq!(run.output.unwrap(), b"CRT0body");
}

#[test]
fn test_compiler_error_message_is_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let run = translate(
        dir.path(),
        &fake(),
        2,
        Manifest::new(),
        &[
            b"define i32 @f()\n".as_slice(),
            b"#error undefined reference to `main'\n".as_slice(),
        ],
    );

    assert_eq!(run.status, TranslateStatus::Failed);
    let report = run.sink.report().unwrap();
    assert_eq!(report.code, ErrorCode::CompileRemote);
    assert_eq!(report.message, "undefined reference to `main'");
}

#[test]
fn test_rejected_chunk_reports_stream_end_message() {
    let dir = tempfile::tempdir().unwrap();
    let run = translate(dir.path(), &fake(), 1, Manifest::new(), &[b"ok".as_slice(), b"#reject".as_slice()]);

    assert_eq!(run.status, TranslateStatus::Failed);
    assert_eq!(
        run.sink.message().as_deref(),
        Some("input contained a rejected chunk")
    );
}

#[test]
fn test_compiler_crash() {
    let dir = tempfile::tempdir().unwrap();
    let run = translate(dir.path(), &fake(), 1, Manifest::new(), &[b"#crash".as_slice()]);

    assert_eq!(run.status, TranslateStatus::Failed);
    let report = run.sink.report().unwrap();
    assert_eq!(report.code, ErrorCode::CompileInternal);
}

#[test]
fn test_missing_compiler_program() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("no-such-llc");
    let run = translate(dir.path(), &missing, 1, Manifest::new(), &[b"x".as_slice()]);

    assert_eq!(run.status, TranslateStatus::Failed);
    let report = run.sink.report().unwrap();
    assert_eq!(report.code, ErrorCode::CompileSetup);
    assert!(
        report
            .message
            .starts_with("Compile process could not be created: ")
    );
}
