// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod compile_stage;
mod job;
mod link_stage;
mod pipeline;
mod stats;

pub use job::{CompletionCallback, ProgressCallback, TranslateJob, TranslateStatus};
pub use pipeline::TranslatePipeline;
pub use stats::TimeStats;
