//! Sensor module - sample types, the transport seam and the simulator

mod traits;
mod simulator;

pub use traits::{round_tenth, RawSample, Sample, Transport, TransportEvent};
pub use simulator::{Simulator, SimulatorHandle, WalkParams, DEFAULT_START, HEART_RATE_WALK, MIN_PERIOD, TEMPERATURE_WALK};
