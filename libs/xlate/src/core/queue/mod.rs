// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod chunk_queue;

pub use chunk_queue::{ChunkPop, ChunkQueue};
