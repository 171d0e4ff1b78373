// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::thread::ThreadId;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};

use super::{CallbackDispatcher, Task};

/// Task queue drained by the thread that created it.
pub struct MainThreadDispatcher {
    owner: ThreadId,
    tx: Sender<Task>,
    rx: Receiver<Task>,
}

/// Clonable posting side of a [`MainThreadDispatcher`].
#[derive(Clone)]
pub struct DispatcherHandle {
    tx: Sender<Task>,
}

impl MainThreadDispatcher {
    /// Create a dispatcher owned by the calling thread.
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            owner: std::thread::current().id(),
            tx,
            rx,
        }
    }

    pub fn handle(&self) -> DispatcherHandle {
        DispatcherHandle {
            tx: self.tx.clone(),
        }
    }

    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    fn on_owner_thread(&self) -> bool {
        if std::thread::current().id() != self.owner {
            tracing::warn!("Dispatcher tasks can only run on the thread that created it");
            return false;
        }
        true
    }

    /// Run every task already queued. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        if !self.on_owner_thread() {
            return 0;
        }
        let mut ran = 0;
        loop {
            match self.rx.try_recv() {
                Ok(task) => {
                    task();
                    ran += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return ran,
            }
        }
    }

    /// Wait up to `timeout` for one task and run it.
    pub fn run_once(&self, timeout: Duration) -> bool {
        if !self.on_owner_thread() {
            return false;
        }
        match self.rx.recv_timeout(timeout) {
            Ok(task) => {
                task();
                true
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    /// Run tasks until `done` returns true, waking at least every `poll`.
    pub fn run_until<F>(&self, mut done: F, poll: Duration) -> usize
    where
        F: FnMut() -> bool,
    {
        if !self.on_owner_thread() {
            return 0;
        }
        let mut ran = 0;
        while !done() {
            if self.run_once(poll) {
                ran += 1 + self.run_pending();
            }
        }
        ran
    }
}

impl Default for MainThreadDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl CallbackDispatcher for DispatcherHandle {
    fn post(&self, task: Task) {
        if self.tx.send(task).is_err() {
            tracing::warn!("Dispatcher is gone, dropping callback");
        }
    }
}

impl CallbackDispatcher for MainThreadDispatcher {
    fn post(&self, task: Task) {
        self.handle().post(task);
    }
}
