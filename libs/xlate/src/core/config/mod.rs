// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod translate_config;

pub use translate_config::{
    DEFAULT_CHUNK_SIZE, DEFAULT_THREAD_STACK_SIZE, TranslateConfig, default_sandbox_arch,
};
