// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! xlate CLI
//!
//! Translates one bitcode file into a linked artifact by streaming it through
//! the configured compiler and linker programs.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use xlate::{
    ErrorSink, LocalResources, LocalTempFile, MainThreadDispatcher, ProcessHost, TempFile,
    TranslateConfig, TranslateJob, TranslatePipeline, TranslateStatus,
};

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "xlate")]
#[command(author, version, about = "Streaming ahead-of-time translator", long_about = None)]
struct Args {
    /// Bitcode file to translate
    input: PathBuf,

    /// Where to write the linked artifact
    #[arg(short, long, value_name = "PATH")]
    output: PathBuf,

    /// Configuration file (defaults to ./xlate.yaml if present)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Number of object files the compiler splits its output into
    #[arg(long, value_name = "N")]
    objects: Option<usize>,

    /// Input read size in bytes
    #[arg(long, value_name = "BYTES")]
    chunk_size: Option<usize>,

    /// Optimization level (0-3)
    #[arg(short = 'O', value_name = "LEVEL")]
    opt_level: Option<u8>,

    /// Compiler program
    #[arg(long, value_name = "PATH")]
    compiler: Option<PathBuf>,

    /// Linker program
    #[arg(long, value_name = "PATH")]
    linker: Option<PathBuf>,

    /// Print timing stats as JSON on success
    #[arg(long)]
    stats: bool,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,

    /// Also write logs to this file
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

fn setup_logging(verbose: bool, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::prelude::*;

    let default_level = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .with_context(|| format!("Invalid log file path: {}", path.display()))?;
            std::fs::create_dir_all(dir)?;

            let file_appender = tracing_appender::rolling::never(dir, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

fn load_config(args: &Args) -> Result<TranslateConfig> {
    let mut config = match &args.config {
        Some(path) => TranslateConfig::load(path)?,
        None => TranslateConfig::load_or_default(&std::env::current_dir()?),
    };

    if let Some(objects) = args.objects {
        config.object_files = objects;
    }
    if let Some(chunk_size) = args.chunk_size {
        config.chunk_size = chunk_size;
    }
    if let Some(level) = args.opt_level {
        config.options.opt_level = level;
    }
    if let Some(compiler) = &args.compiler {
        config.compiler = compiler.clone();
    }
    if let Some(linker) = &args.linker {
        config.linker = linker.clone();
    }

    config.validate()?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = setup_logging(args.verbose, args.log_file.as_deref())?;

    let config = load_config(&args)?;
    tracing::debug!("Using config: {:?}", config);

    let mut input = std::fs::File::open(&args.input)
        .with_context(|| format!("Failed to open {}", args.input.display()))?;

    let dispatcher = MainThreadDispatcher::new();
    let pipeline = Arc::new(TranslatePipeline::from_config(&config));
    {
        let pipeline = Arc::clone(&pipeline);
        ctrlc::set_handler(move || {
            tracing::warn!("Interrupted, aborting translation");
            pipeline.abort();
        })
        .context("Failed to install Ctrl+C handler")?;
    }

    let object_files = (0..config.object_files)
        .map(|_| LocalTempFile::new().map(|f| Arc::new(f) as Arc<dyn TempFile>))
        .collect::<std::io::Result<Vec<_>>>()
        .context("Failed to create object files")?;
    let output = Arc::new(LocalTempFile::new().context("Failed to create output file")?);

    let sink = ErrorSink::new();
    let status: Arc<OnceLock<TranslateStatus>> = Arc::new(OnceLock::new());

    let job = TranslateJob::new(
        Arc::new(LocalResources::from_config(&config)),
        Arc::new(ProcessHost::from_config(&config)),
        Arc::new(dispatcher.handle()),
        Arc::clone(&output) as Arc<dyn TempFile>,
    )
    .with_object_files(object_files)
    .with_options(config.options.clone())
    .with_manifest(config.manifest.clone())
    .with_error_sink(sink.clone())
    .with_progress(|len| tracing::trace!("Compiler accepted {} bytes", len))
    .with_completion({
        let status = Arc::clone(&status);
        move |s| {
            let _ = status.set(s);
        }
    });

    pipeline.start(job)?;
    tracing::info!(
        "[{}] Translating {} -> {}",
        pipeline.id(),
        args.input.display(),
        args.output.display()
    );

    let mut buf = vec![0u8; config.chunk_size];
    loop {
        let n = match input.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                sink.set_report_if_empty(
                    xlate::ErrorCode::InvalidRequest,
                    format!("Failed to read {}: {}", args.input.display(), e),
                );
                pipeline.abort();
                break;
            }
        };
        if !pipeline.feed(buf[..n].to_vec()) {
            break;
        }
        dispatcher.run_pending();
    }
    pipeline.finish();

    dispatcher.run_until(|| status.get().is_some(), Duration::from_millis(50));
    pipeline.join();

    match status.get() {
        Some(TranslateStatus::Succeeded) => {
            output
                .persist_copy(&args.output)
                .with_context(|| format!("Failed to write {}", args.output.display()))?;
            tracing::info!("Wrote {}", args.output.display());

            if args.stats {
                println!("{}", serde_json::to_string_pretty(&pipeline.stats())?);
            }
            Ok(())
        }
        _ => {
            let message = sink
                .report()
                .map(|r| r.to_string())
                .unwrap_or_else(|| "translation failed".to_string());
            bail!("{}", message)
        }
    }
}
