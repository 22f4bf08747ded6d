//! A capability-constrained null device.
//!
//! The null device accepts any configuration inside its [`Caps`],
//! discards written frames, and delivers silence on capture. It stands in
//! for a real leaf device wherever one is not wanted: examples, the test
//! suites of the adaptation nodes, and sinks for diagnostic runs.

use std::fmt;

use pk_core::{
    error::{PcmError, Result},
    interval::Interval,
    mask::{AccessMask, FormatMask},
};

use crate::{
    hwparams::HwParams,
    info::{ChannelInfo, Info},
    pcm::{Pcm, Stream},
    state::{State, Status},
    swparams::SwParams,
};

/// The configuration space a [`NullPcm`] accepts.
#[derive(Debug, Clone)]
pub struct Caps {
    /// Acceptable frame-access layouts.
    pub access: AccessMask,
    /// Acceptable sample formats.
    pub formats: FormatMask,
    /// Acceptable channel counts.
    pub channels: Interval,
    /// Acceptable frame rates.
    pub rates: Interval,
}

impl Default for Caps {
    fn default() -> Self {
        Self {
            access: AccessMask::any(),
            formats: FormatMask::any(),
            channels: Interval::new(1, 1024),
            rates: Interval::new(4000, 768000),
        }
    }
}

/// A discard/silence device constrained to a capability set.
#[derive(Debug)]
pub struct NullPcm {
    name: String,
    stream: Stream,
    caps: Caps,
    state: State,
    nonblock: bool,
    setup: Option<HwParams>,
    sw: SwParams,
    closed: bool,
}

impl NullPcm {
    /// Create a null device with the given capability set.
    pub fn new(name: impl Into<String>, stream: Stream, caps: Caps) -> Self {
        Self {
            name: name.into(),
            stream,
            caps,
            state: State::Open,
            nonblock: false,
            setup: None,
            sw: SwParams::default(),
            closed: false,
        }
    }

    /// Has [`Pcm::close`] been called on this device?
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// The installed hardware configuration, if any.
    pub fn setup(&self) -> Option<&HwParams> {
        self.setup.as_ref()
    }

    fn transfer(&mut self, frames: u64) -> Result<u64> {
        match self.state {
            State::Prepared => {
                self.state = State::Running;
                Ok(frames)
            }
            State::Running => Ok(frames),
            _ => Err(PcmError::BadState),
        }
    }
}

impl Pcm for NullPcm {
    fn name(&self) -> &str {
        &self.name
    }

    fn stream(&self) -> Stream {
        self.stream
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.setup = None;
        self.state = State::Open;
        Ok(())
    }

    fn info(&mut self) -> Result<Info> {
        Ok(Info {
            card: -1,
            device: 0,
            subdevice: 0,
            id: "NULL".into(),
            name: "Null".into(),
            subname: "Null PCM".into(),
            stream: self.stream,
            subdevices_count: 1,
        })
    }

    fn hw_refine(&mut self, params: &mut HwParams) -> Result<()> {
        params.access.intersect(&self.caps.access);
        params.format.intersect(&self.caps.formats);
        if params.access.is_empty() || params.format.is_empty() {
            return Err(PcmError::Unsatisfiable);
        }
        params.channels.refine(&self.caps.channels)?;
        params.rate.refine(&self.caps.rates)?;
        Ok(())
    }

    fn hw_params(&mut self, params: &mut HwParams) -> Result<()> {
        self.hw_refine(params)?;
        self.setup = Some(params.clone());
        self.state = State::Setup;
        Ok(())
    }

    fn hw_free(&mut self) -> Result<()> {
        self.setup = None;
        self.state = State::Open;
        Ok(())
    }

    fn sw_params(&mut self, params: &SwParams) -> Result<()> {
        self.sw = *params;
        Ok(())
    }

    fn channel_info(&mut self, channel: u32) -> Result<ChannelInfo> {
        let setup = self.setup.as_ref().ok_or(PcmError::BadState)?;
        if channel >= setup.chosen_channels()? {
            return Err(PcmError::BadArgument);
        }
        Ok(ChannelInfo {
            channel,
            first: 0,
            step: 0,
        })
    }

    fn dump(&self, w: &mut dyn fmt::Write) -> fmt::Result {
        writeln!(w, "Null PCM")
    }

    fn set_nonblock(&mut self, nonblock: bool) -> Result<()> {
        self.nonblock = nonblock;
        Ok(())
    }

    fn set_async(&mut self, _sig: i32, _pid: i32) -> Result<()> {
        Ok(())
    }

    fn status(&mut self) -> Result<Status> {
        let avail = self.avail_update().unwrap_or(0);
        Ok(Status {
            state: self.state,
            delay: 0,
            avail,
            avail_max: avail,
        })
    }

    fn state(&mut self) -> State {
        self.state
    }

    fn delay(&mut self) -> Result<i64> {
        Ok(0)
    }

    fn prepare(&mut self) -> Result<()> {
        if self.setup.is_none() {
            return Err(PcmError::BadState);
        }
        self.state = State::Prepared;
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        if self.state != State::Prepared {
            return Err(PcmError::BadState);
        }
        self.state = State::Running;
        Ok(())
    }

    fn drop_pending(&mut self) -> Result<()> {
        if self.setup.is_none() {
            return Err(PcmError::BadState);
        }
        self.state = State::Setup;
        Ok(())
    }

    fn drain(&mut self) -> Result<()> {
        if self.setup.is_none() {
            return Err(PcmError::BadState);
        }
        self.state = State::Setup;
        Ok(())
    }

    fn pause(&mut self, enable: bool) -> Result<()> {
        match (self.state, enable) {
            (State::Running, true) => {
                self.state = State::Paused;
                Ok(())
            }
            (State::Paused, false) => {
                self.state = State::Running;
                Ok(())
            }
            _ => Err(PcmError::BadState),
        }
    }

    fn rewind(&mut self, _frames: u64) -> Result<u64> {
        Ok(0)
    }

    fn writei(&mut self, _buf: &[u8], frames: u64) -> Result<u64> {
        if self.stream != Stream::Playback {
            return Err(PcmError::BadState);
        }
        self.transfer(frames)
    }

    fn writen(&mut self, _bufs: &[&[u8]], frames: u64) -> Result<u64> {
        if self.stream != Stream::Playback {
            return Err(PcmError::BadState);
        }
        self.transfer(frames)
    }

    fn readi(&mut self, buf: &mut [u8], frames: u64) -> Result<u64> {
        if self.stream != Stream::Capture {
            return Err(PcmError::BadState);
        }
        buf.fill(0);
        self.transfer(frames)
    }

    fn readn(&mut self, bufs: &mut [&mut [u8]], frames: u64) -> Result<u64> {
        if self.stream != Stream::Capture {
            return Err(PcmError::BadState);
        }
        for buf in bufs.iter_mut() {
            buf.fill(0);
        }
        self.transfer(frames)
    }

    fn avail_update(&mut self) -> Result<u64> {
        let setup = self.setup.as_ref().ok_or(PcmError::BadState)?;
        Ok(setup.buffer_size.value() as u64)
    }

    fn mmap_forward(&mut self, frames: u64) -> Result<u64> {
        self.transfer(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pk_core::{access::Access, format::SampleFormat};

    fn stereo_caps() -> Caps {
        Caps {
            access: AccessMask::of(&[Access::MmapNoninterleaved, Access::RwInterleaved]),
            formats: FormatMask::of(&[SampleFormat::S16Le]),
            channels: Interval::single(2),
            rates: Interval::single(48000),
        }
    }

    #[test]
    fn test_refine_intersects_caps() {
        let mut dev = NullPcm::new("null", Stream::Playback, stereo_caps());
        let mut params = HwParams::any();
        dev.hw_refine(&mut params).unwrap();
        assert_eq!(params.format.first(), Some(SampleFormat::S16Le));
        assert_eq!(params.channels.value(), 2);
        assert_eq!(params.rate.value(), 48000);
        assert!(!params.access.test(Access::RwNoninterleaved));
    }

    #[test]
    fn test_refine_rejects_impossible_requests() {
        let mut dev = NullPcm::new("null", Stream::Playback, stereo_caps());
        let mut params = HwParams::any();
        params.rate = Interval::single(44100);
        assert_eq!(dev.hw_refine(&mut params), Err(PcmError::Unsatisfiable));
    }

    #[test]
    fn test_lifecycle_and_transfer() {
        let mut dev = NullPcm::new("null", Stream::Playback, stereo_caps());
        let mut params = HwParams::any();
        dev.hw_params(&mut params).unwrap();
        assert_eq!(dev.state(), State::Setup);
        dev.prepare().unwrap();
        let written = dev.writei(&[0u8; 64], 16).unwrap();
        assert_eq!(written, 16);
        assert_eq!(dev.state(), State::Running);
    }

    #[test]
    fn test_transfer_requires_prepare() {
        let mut dev = NullPcm::new("null", Stream::Playback, stereo_caps());
        let mut params = HwParams::any();
        dev.hw_params(&mut params).unwrap();
        assert_eq!(dev.writei(&[0u8; 4], 1), Err(PcmError::BadState));
    }

    #[test]
    fn test_close_marks_closed() {
        let mut dev = NullPcm::new("null", Stream::Playback, Caps::default());
        assert!(!dev.is_closed());
        dev.close().unwrap();
        assert!(dev.is_closed());
    }
}
