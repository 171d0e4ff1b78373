// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use serde::{Deserialize, Serialize};

pub const DEFAULT_OPT_LEVEL: u8 = 2;
pub const MAX_OPT_LEVEL: u8 = 3;

/// Code generation options forwarded to the compiler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslateOptions {
    pub opt_level: u8,
    pub extra_flags: Vec<String>,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        Self {
            opt_level: DEFAULT_OPT_LEVEL,
            extra_flags: Vec::new(),
        }
    }
}

impl TranslateOptions {
    pub fn with_opt_level(mut self, opt_level: u8) -> Self {
        self.opt_level = opt_level;
        self
    }

    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.extra_flags.push(flag.into());
        self
    }

    /// Flags as consecutive NUL-terminated strings.
    pub fn opt_commandline(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        push_arg(&mut buf, &format!("-O{}", self.opt_level));
        for flag in &self.extra_flags {
            push_arg(&mut buf, flag);
        }
        buf
    }

    /// Option blob for `StreamInitWithSplit`.
    ///
    /// The compiler reads its module count from the leading
    /// `-split-module=N` flag rather than the integer argument.
    pub fn init_option_buffer(&self, object_count: usize) -> Vec<u8> {
        let mut buf = Vec::new();
        push_arg(&mut buf, &format!("-split-module={}", object_count));
        buf.extend_from_slice(&self.opt_commandline());
        buf
    }
}

fn push_arg(buf: &mut Vec<u8>, arg: &str) {
    buf.extend_from_slice(arg.as_bytes());
    buf.push(0);
}
