// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/vitalwatch

//! Summary statistics over a history snapshot

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::sensors::{round_tenth, Sample};

/// Look-back window, measured from the newest sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeRange {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "24h")]
    OneDay,
}

impl TimeRange {
    pub const ALL: [TimeRange; 5] = [
        TimeRange::OneMinute,
        TimeRange::FiveMinutes,
        TimeRange::FifteenMinutes,
        TimeRange::OneHour,
        TimeRange::OneDay,
    ];

    pub fn duration(self) -> Duration {
        match self {
            TimeRange::OneMinute => Duration::minutes(1),
            TimeRange::FiveMinutes => Duration::minutes(5),
            TimeRange::FifteenMinutes => Duration::minutes(15),
            TimeRange::OneHour => Duration::hours(1),
            TimeRange::OneDay => Duration::hours(24),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TimeRange::OneMinute => "1m",
            TimeRange::FiveMinutes => "5m",
            TimeRange::FifteenMinutes => "15m",
            TimeRange::OneHour => "1h",
            TimeRange::OneDay => "24h",
        }
    }
}

impl FromStr for TimeRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeRange::ALL
            .into_iter()
            .find(|r| r.label() == s)
            .ok_or_else(|| format!("unknown time range '{}', expected one of 1m, 5m, 15m, 1h, 24h", s))
    }
}

/// min / max / average of one metric
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub min: f64,
    pub max: f64,
    /// Rounded to one decimal
    pub avg: f64,
}

impl MetricSummary {
    /// Empty input yields all zeros.
    pub fn from_values<I: IntoIterator<Item = f64>>(values: I) -> Self {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;

        for v in values {
            count += 1;
            sum += v;
            min = min.min(v);
            max = max.max(v);
        }

        if count == 0 {
            return Self::default();
        }

        Self {
            min,
            max,
            avg: round_tenth(sum / count as f64),
        }
    }
}

/// Statistics for the analytics view
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStats {
    pub count: usize,
    /// Samples where either metric was outside its range
    pub alerts: usize,
    pub heart_rate: MetricSummary,
    pub temperature: MetricSummary,
}

impl HistoryStats {
    /// Summarize `samples` (oldest first), optionally limited to `range`.
    pub fn compute(samples: &[Sample], range: Option<TimeRange>) -> Self {
        let window = window(samples, range);

        Self {
            count: window.len(),
            alerts: window.iter().filter(|s| s.is_alert()).count(),
            heart_rate: MetricSummary::from_values(window.iter().map(|s| s.heart_rate() as f64)),
            temperature: MetricSummary::from_values(window.iter().map(|s| s.temperature())),
        }
    }
}

fn window(samples: &[Sample], range: Option<TimeRange>) -> &[Sample] {
    let (Some(range), Some(newest)) = (range, samples.last()) else {
        return samples;
    };

    let cutoff = newest.timestamp() - range.duration();
    // Samples are time-ordered, so the window is a suffix
    let start = samples.partition_point(|s| s.timestamp() < cutoff);
    &samples[start..]
}
