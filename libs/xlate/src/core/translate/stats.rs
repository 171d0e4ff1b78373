// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::time::Duration;

use serde::{Serialize, Serializer};

/// Timings and counters for one translation. Durations serialize as
/// microseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TimeStats {
    #[serde(serialize_with = "as_micros")]
    pub compiler_load_time: Option<Duration>,
    #[serde(serialize_with = "as_micros")]
    pub compile_time: Option<Duration>,
    #[serde(serialize_with = "as_micros")]
    pub linker_load_time: Option<Duration>,
    #[serde(serialize_with = "as_micros")]
    pub link_time: Option<Duration>,
    pub bytes_streamed: u64,
    pub chunks_streamed: u64,
}

impl TimeStats {
    /// Sum of every recorded phase.
    pub fn total(&self) -> Duration {
        [
            self.compiler_load_time,
            self.compile_time,
            self.linker_load_time,
            self.link_time,
        ]
        .into_iter()
        .flatten()
        .sum()
    }
}

fn as_micros<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(d) => serializer.serialize_some(&(d.as_micros() as u64)),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_uses_micros() {
        let stats = TimeStats {
            compiler_load_time: Some(Duration::from_millis(3)),
            compile_time: Some(Duration::from_micros(1500)),
            bytes_streamed: 35,
            chunks_streamed: 3,
            ..Default::default()
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["compiler_load_time"], 3000);
        assert_eq!(json["compile_time"], 1500);
        assert!(json["link_time"].is_null());
        assert_eq!(json["bytes_streamed"], 35);
        assert_eq!(stats.total(), Duration::from_micros(4500));
    }
}
