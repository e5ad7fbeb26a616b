// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/vitalwatch

//! Threshold classification

use serde::{Deserialize, Serialize};

/// Three-way status of a metric against its threshold range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Normal,
    Low,
    High,
}

impl Status {
    pub fn is_normal(self) -> bool {
        self == Status::Normal
    }

    pub fn label(self) -> &'static str {
        match self {
            Status::Normal => "Normal",
            Status::Low => "Low",
            Status::High => "High",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Inclusive `{min, max}` range for one metric.
///
/// Applied literally: an inverted range (`min > max`) is not rejected or
/// repaired, it simply classifies every value as either Low or High.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn classify(&self, value: f64) -> Status {
        classify(value, self)
    }

    pub fn is_inverted(&self) -> bool {
        self.min > self.max
    }
}

/// Per-metric threshold configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdConfig {
    #[serde(alias = "heart_rate")]
    pub heart_rate: Range,
    pub temperature: Range,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            heart_rate: Range::new(60.0, 100.0),
            temperature: Range::new(21.0, 29.0),
        }
    }
}

/// Frozen classification of both metrics of one sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleStatus {
    pub heart_rate: Status,
    pub temperature: Status,
}

impl SampleStatus {
    /// Classify both metrics against `thresholds`.
    pub fn evaluate(heart_rate: f64, temperature: f64, thresholds: &ThresholdConfig) -> Self {
        Self {
            heart_rate: thresholds.heart_rate.classify(heart_rate),
            temperature: thresholds.temperature.classify(temperature),
        }
    }

    /// A sample is alert-worthy when either metric leaves its range.
    pub fn is_alert(&self) -> bool {
        !self.heart_rate.is_normal() || !self.temperature.is_normal()
    }
}

/// Map `value` onto Low / Normal / High. Both bounds are inclusive.
pub fn classify(value: f64, range: &Range) -> Status {
    if value < range.min {
        Status::Low
    } else if value > range.max {
        Status::High
    } else {
        Status::Normal
    }
}
