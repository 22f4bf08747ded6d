//! # Plugkit Surround
//!
//! A multi-device aggregator presenting one logical 4.0 or 5.1 playback
//! stream while internally driving up to three stereo slave streams that
//! must stay synchronized.
//!
//! Channel order of the logical stream: front left, front right, rear
//! left, rear right, center, LFE.

pub mod config;
pub mod surround;

pub use surround::{Surround, SurroundLayout};
