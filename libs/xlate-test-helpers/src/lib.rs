// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Test helpers for `xlate`. See `src/bin/fake_translator.rs`.
