// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/vitalwatch

//! Vital-sign simulator used whenever no live transport is active

use rand::prelude::*;
use rand::rngs::StdRng;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use super::traits::{round_tenth, RawSample};

/// Shortest tick the simulator runs at
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Bounded random walk parameters for one metric
#[derive(Debug, Clone, Copy)]
pub struct WalkParams {
    /// Base delta is drawn uniformly from `[-step, +step]`
    pub step: f64,
    /// Chance per tick of an extra spike
    pub spike_probability: f64,
    /// Spike delta is drawn uniformly from `[-spike, +spike]`
    pub spike: f64,
    pub min: f64,
    pub max: f64,
}

pub const HEART_RATE_WALK: WalkParams = WalkParams {
    step: 2.0,
    spike_probability: 0.10,
    spike: 5.0,
    min: 40.0,
    max: 120.0,
};

pub const TEMPERATURE_WALK: WalkParams = WalkParams {
    step: 0.2,
    spike_probability: 0.05,
    spike: 1.0,
    min: 15.0,
    max: 40.0,
};

/// Where the walk starts when there is no previous sample
pub const DEFAULT_START: RawSample = RawSample {
    heart_rate: 72.0,
    temperature: 26.5,
};

/// Generates physiologically plausible heart-rate / temperature pairs
pub struct Simulator {
    rng: StdRng,
    last: RawSample,
}

impl Simulator {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            last: DEFAULT_START,
        }
    }

    /// Reproducible walk
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            last: DEFAULT_START,
        }
    }

    /// Continue the walk from a previous reading instead of the defaults.
    pub fn starting_from(mut self, last: RawSample) -> Self {
        if last.is_finite() {
            self.last = last;
        }
        self
    }

    pub fn last(&self) -> RawSample {
        self.last
    }

    /// Advance both walks by one tick.
    pub fn next_sample(&mut self) -> RawSample {
        let heart_rate = self.step(self.last.heart_rate, &HEART_RATE_WALK).round();
        let temperature = round_tenth(self.step(self.last.temperature, &TEMPERATURE_WALK));

        self.last = RawSample::new(heart_rate, temperature);
        self.last
    }

    fn step(&mut self, prev: f64, params: &WalkParams) -> f64 {
        let mut delta = self.rng.gen_range(-params.step..=params.step);
        if self.rng.gen_bool(params.spike_probability) {
            delta += self.rng.gen_range(-params.spike..=params.spike);
        }
        (prev + delta).clamp(params.min, params.max)
    }

    /// Run the walk on a timer, handing each sample to `sink`.
    ///
    /// The first sample arrives one `period` after spawning. The loop ends
    /// when `sink` returns `false` or the handle is stopped. Periods shorter
    /// than [`MIN_PERIOD`] are raised to it.
    pub fn spawn<F>(mut self, period: Duration, mut sink: F) -> SimulatorHandle
    where
        F: FnMut(RawSample) -> bool + Send + 'static,
    {
        let period = period.max(MIN_PERIOD);
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let sample = self.next_sample();
                if !sink(sample) {
                    debug!("Simulator sink rejected sample, stopping");
                    break;
                }
            }
        });

        SimulatorHandle { task: Some(task) }
    }
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}

/// Owner of a running simulator loop. Dropping it stops the loop.
pub struct SimulatorHandle {
    task: Option<JoinHandle<()>>,
}

impl SimulatorHandle {
    pub fn is_running(&self) -> bool {
        self.task.as_ref().map(|t| !t.is_finished()).unwrap_or(false)
    }

    /// Abort the loop. Callers that need a hard guarantee against a sample
    /// already in flight must also reject it at the sink.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for SimulatorHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
