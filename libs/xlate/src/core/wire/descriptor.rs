// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Fixed fan-out of object-file descriptor slots in `StreamInitWithSplit`
/// and `RunWithSplit`. Part of the wire format; unused slots carry
/// [`Descriptor::Invalid`].
pub const MAX_OBJECT_FILES: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Access {
    Read,
    Write,
}

/// A file handle passed to a subprocess.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Descriptor {
    /// Sentinel for unused slots.
    Invalid,
    File {
        /// Quota-tracker identifier of the backing temp file.
        id: String,
        path: PathBuf,
        access: Access,
    },
}

impl Descriptor {
    pub fn is_valid(&self) -> bool {
        !matches!(self, Self::Invalid)
    }

    pub fn file_id(&self) -> Option<&str> {
        match self {
            Self::File { id, .. } => Some(id),
            Self::Invalid => None,
        }
    }

    pub fn access(&self) -> Option<Access> {
        match self {
            Self::File { access, .. } => Some(*access),
            Self::Invalid => None,
        }
    }
}

/// Pad `real` to exactly [`MAX_OBJECT_FILES`] entries with invalid sentinels.
///
/// Callers validate the count up front; anything past the fixed fan-out is
/// truncated.
pub fn pad_descriptors(real: &[Descriptor]) -> Vec<Descriptor> {
    debug_assert!(real.len() <= MAX_OBJECT_FILES);
    let mut slots: Vec<Descriptor> = real.iter().take(MAX_OBJECT_FILES).cloned().collect();
    slots.resize(MAX_OBJECT_FILES, Descriptor::Invalid);
    slots
}
