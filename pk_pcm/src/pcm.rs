//! The uniform PCM stream object.
//!
//! Every adaptation node — plug, surround, conversion wrappers, leaf
//! devices — implements [`Pcm`]. The trait carries two operation tables:
//! the slow table (configuration and lifecycle) and the fast table
//! (state, position and frame transfer). A node implements both by
//! delegating to zero or more downstream slave nodes.

use std::{cell::RefCell, fmt, rc::Rc};

use pk_core::error::Result;

use crate::{
    hwparams::HwParams,
    info::{ChannelInfo, Info},
    state::{State, Status},
    swparams::SwParams,
};

/// Direction of a PCM stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    /// The application produces frames for the device.
    Playback,
    /// The device produces frames for the application.
    Capture,
}

/// Blocking behavior requested at open time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    /// Transfers may block until the device can make progress.
    #[default]
    Blocking,
    /// Transfers return immediately with what fits.
    Nonblocking,
}

/// A PCM stream node.
///
/// Frame counts are in frames, buffers in raw bytes; the interleaved
/// entry points take one buffer, the non-interleaved ones a slice of
/// per-channel buffers. Operations never synchronize internally: a node
/// shared across threads must be serialized by the caller.
pub trait Pcm {
    /// The node's name, as given at open time.
    fn name(&self) -> &str;

    /// Direction of this stream.
    fn stream(&self) -> Stream;

    // --- slow table ---

    /// Release the node's device resources. Whether downstream slaves are
    /// closed as well is each node's documented ownership policy.
    fn close(&mut self) -> Result<()>;

    /// Static identity of the device behind this node.
    fn info(&mut self) -> Result<Info>;

    /// Narrow `params` to the feasible region without committing to a
    /// single configuration.
    fn hw_refine(&mut self, params: &mut HwParams) -> Result<()>;

    /// Install a hardware configuration chosen from a refined block.
    fn hw_params(&mut self, params: &mut HwParams) -> Result<()>;

    /// Drop the installed hardware configuration.
    fn hw_free(&mut self) -> Result<()>;

    /// Install software transfer parameters.
    fn sw_params(&mut self, params: &SwParams) -> Result<()>;

    /// Placement of one channel inside the transfer area.
    fn channel_info(&mut self, channel: u32) -> Result<ChannelInfo>;

    /// Human-readable description of this node and its slaves.
    fn dump(&self, w: &mut dyn fmt::Write) -> fmt::Result;

    /// Switch the node (and its slaves) between blocking and nonblocking
    /// transfers.
    fn set_nonblock(&mut self, nonblock: bool) -> Result<()>;

    /// Route asynchronous notification to the given signal and process.
    fn set_async(&mut self, sig: i32, pid: i32) -> Result<()>;

    /// Map the transfer area. Nodes without a mapping accept and ignore.
    fn mmap(&mut self) -> Result<()> {
        Ok(())
    }

    /// Unmap the transfer area.
    fn munmap(&mut self) -> Result<()> {
        Ok(())
    }

    // --- fast table ---

    /// Snapshot of state, position and fill level.
    fn status(&mut self) -> Result<Status>;

    /// Current stream state.
    fn state(&mut self) -> State;

    /// Frames between application and hardware position.
    fn delay(&mut self) -> Result<i64>;

    /// Make the stream ready for transfer.
    fn prepare(&mut self) -> Result<()>;

    /// Reset position without touching the configuration.
    fn reset(&mut self) -> Result<()>;

    /// Start the stream explicitly.
    fn start(&mut self) -> Result<()>;

    /// Stop immediately, dropping pending frames.
    fn drop_pending(&mut self) -> Result<()>;

    /// Stop after pending frames have played out.
    fn drain(&mut self) -> Result<()>;

    /// Pause or resume a running stream.
    fn pause(&mut self, enable: bool) -> Result<()>;

    /// Move the application position backwards by up to `frames`.
    /// Returns the frames actually rewound.
    fn rewind(&mut self, frames: u64) -> Result<u64>;

    /// Write interleaved frames. Returns the frames accepted.
    fn writei(&mut self, buf: &[u8], frames: u64) -> Result<u64>;

    /// Write non-interleaved frames, one buffer per channel.
    fn writen(&mut self, bufs: &[&[u8]], frames: u64) -> Result<u64>;

    /// Read interleaved frames. Returns the frames delivered.
    fn readi(&mut self, buf: &mut [u8], frames: u64) -> Result<u64>;

    /// Read non-interleaved frames, one buffer per channel.
    fn readn(&mut self, bufs: &mut [&mut [u8]], frames: u64) -> Result<u64>;

    /// Refresh and return the frames available for transfer.
    fn avail_update(&mut self) -> Result<u64>;

    /// Advance the application position over a mapped area.
    fn mmap_forward(&mut self, frames: u64) -> Result<u64>;
}

/// Shared handle to a PCM node.
///
/// The adaptation layer is single-threaded cooperative: all operations
/// run on the caller's thread and nothing locks internally, which
/// `Rc<RefCell<..>>` spells out at the type level.
pub type SharedPcm = Rc<RefCell<dyn Pcm>>;

/// Wrap a node into a [`SharedPcm`] handle.
pub fn share<P: Pcm + 'static>(pcm: P) -> SharedPcm {
    Rc::new(RefCell::new(pcm))
}
