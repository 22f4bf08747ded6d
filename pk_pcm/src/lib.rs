//! # Plugkit PCM
//!
//! The uniform PCM stream object and the machinery adaptation nodes build
//! on: the [`Pcm`] operation trait (slow and fast tables), hardware and
//! software parameter blocks, the two-way client/slave refinement harness,
//! route-matrix loading, conversion-stage factories, and the null device.

pub mod config;
pub mod convert;
pub mod hwparams;
pub mod info;
pub mod null;
pub mod pcm;
pub mod refine;
pub mod route;
pub mod state;
pub mod swparams;

pub use convert::ConverterSet;
pub use hwparams::{HwParams, Param};
pub use info::{ChannelInfo, Info};
pub use null::{Caps, NullPcm};
pub use pcm::{Mode, Pcm, SharedPcm, Stream, share};
pub use refine::{SlaveRefine, refine_with_slave};
pub use route::{FULL, MAX_CHANNELS, RouteMatrix, RouteWeight};
pub use state::{State, Status};
pub use swparams::SwParams;
