// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Marshaling of progress and completion callbacks back to the thread that
//! started a translation.

mod main_thread;

pub use main_thread::{DispatcherHandle, MainThreadDispatcher};

/// Unit of work posted to the originating thread.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs posted tasks on the originating thread, never synchronously inside
/// `post`.
pub trait CallbackDispatcher: Send + Sync {
    fn post(&self, task: Task);
}
