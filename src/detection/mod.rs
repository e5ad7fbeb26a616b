//! Detection module - threshold classification of vital signs

mod classification;

pub use classification::*;
