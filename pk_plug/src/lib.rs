//! # Plugkit Plug
//!
//! A transparent adapter between the configuration a client asks for and
//! the configurations a slave device accepts. Given the slave's
//! capability set, the plug inserts the minimal ordered chain of
//! conversion stages — format converter, channel router, rate converter,
//! access repacker — so the device sees something it can drive while the
//! client sees exactly what it requested.

pub mod config;
pub mod format;
pub mod plug;

pub use format::slave_format;
pub use plug::Plug;
