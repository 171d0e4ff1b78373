// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Shared first-error-wins failure record.

use std::sync::Arc;

use parking_lot::Mutex;

use super::error::ErrorCode;

/// A single recorded failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub message: String,
}

impl std::fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Error record shared between the caller and the translate thread.
///
/// Holds at most one report per translation attempt. Whoever reports first
/// wins, which lets the caller record its own failure (e.g. the input could
/// not be fetched) before aborting without the induced stage failure
/// overwriting it.
#[derive(Debug, Clone, Default)]
pub struct ErrorSink {
    inner: Arc<Mutex<Option<ErrorReport>>>,
}

impl ErrorSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a report unless one is already present.
    ///
    /// Returns `true` if this report was stored.
    pub fn set_report_if_empty(&self, code: ErrorCode, message: impl Into<String>) -> bool {
        let mut guard = self.inner.lock();
        if let Some(existing) = guard.as_ref() {
            tracing::debug!(
                "Dropping later failure report ({}), keeping {}",
                code,
                existing
            );
            return false;
        }
        *guard = Some(ErrorReport {
            code,
            message: message.into(),
        });
        true
    }

    pub fn report(&self) -> Option<ErrorReport> {
        self.inner.lock().clone()
    }

    pub fn message(&self) -> Option<String> {
        self.inner.lock().as_ref().map(|r| r.message.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_none()
    }

    /// Forget the stored report so the sink can serve another attempt.
    pub fn clear(&self) {
        *self.inner.lock() = None;
    }
}
