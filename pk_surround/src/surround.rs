//! The surround aggregator node.

use std::fmt;

use pk_core::{
    error::{PcmError, Result},
    interval::Interval,
};
use pk_pcm::{
    hwparams::HwParams,
    info::{ChannelInfo, Info},
    pcm::{Pcm, SharedPcm, Stream},
    state::{State, Status},
    swparams::SwParams,
};

/// Logical speaker layout of a surround stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SurroundLayout {
    /// Four speakers: front pair and rear pair.
    #[default]
    Surround40,
    /// Front pair, rear pair, center and LFE.
    Surround51,
}

impl SurroundLayout {
    /// Number of logical channels carried by this layout.
    #[inline]
    pub const fn channel_count(&self) -> u32 {
        match self {
            Self::Surround40 => 4,
            Self::Surround51 => 6,
        }
    }
}

/// One logical multichannel stream over one native device or a gang of
/// stereo devices.
///
/// With a single slave the device is natively multichannel and keeps its
/// interleaved transfer semantics. With several slaves every member is
/// addressed as a stereo pair and only non-interleaved transfers exist;
/// the slaves' per-call frame counts must agree, otherwise the stream is
/// broken until the next prepare.
pub struct Surround {
    name: String,
    stream: Stream,
    card: i32,
    device: u32,
    layout: SurroundLayout,
    slaves: Vec<SharedPcm>,
    broken: bool,
}

impl std::fmt::Debug for Surround {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Surround")
            .field("name", &self.name)
            .field("stream", &self.stream)
            .field("card", &self.card)
            .field("device", &self.device)
            .field("layout", &self.layout)
            .field("broken", &self.broken)
            .finish_non_exhaustive()
    }
}

impl Surround {
    /// Aggregate `slaves` into one logical stream.
    ///
    /// The slaves are pre-opened and owned by the aggregator from here
    /// on. Capture streams are not supported. The slave count must be 1
    /// (a natively multichannel device) or exactly half the layout's
    /// channel count (a stereo gang).
    pub fn new(
        name: impl Into<String>,
        card: i32,
        device: u32,
        layout: SurroundLayout,
        stream: Stream,
        slaves: Vec<SharedPcm>,
    ) -> Result<Surround> {
        if stream == Stream::Capture {
            return Err(PcmError::BadArgument);
        }
        let channels = layout.channel_count();
        if slaves.is_empty() || (slaves.len() != 1 && slaves.len() as u32 * 2 != channels) {
            return Err(PcmError::BadArgument);
        }
        Ok(Surround {
            name: name.into(),
            stream,
            card,
            device,
            layout,
            slaves,
            broken: false,
        })
    }

    /// The logical channel count (4 or 6).
    #[inline]
    pub fn channels(&self) -> u32 {
        self.layout.channel_count()
    }

    /// The layout this stream presents.
    #[inline]
    pub fn layout(&self) -> SurroundLayout {
        self.layout
    }

    /// Number of underlying streams (1, 2 or 3).
    #[inline]
    pub fn slave_count(&self) -> usize {
        self.slaves.len()
    }

    /// Coerce the channel interval to the logical channel count.
    ///
    /// In refining mode open endpoints close onto the logical count and
    /// a covering range narrows to it; outside refining mode anything
    /// but the exact count is an error.
    fn enforce_channels(&self, params: &mut HwParams, refining: bool) -> Result<()> {
        let channels = self.layout.channel_count();
        let interval = &mut params.channels;
        if interval.is_empty() {
            return Err(PcmError::Unsatisfiable);
        }
        if interval.openmin() {
            if !refining {
                return Err(PcmError::Unsatisfiable);
            }
            interval.set_min(channels, false);
        }
        if interval.openmax() {
            if !refining {
                return Err(PcmError::Unsatisfiable);
            }
            interval.set_max(channels, false);
        }
        if refining && interval.min() <= channels && interval.max() >= channels {
            *interval = Interval::single(channels);
        }
        if !interval.is_single() || interval.value() != channels {
            return Err(PcmError::Unsatisfiable);
        }
        Ok(())
    }

    /// Fan a parameter operation out to the slaves. A stereo gang sees a
    /// two-channel view; the logical view is restored afterwards.
    fn fan_out_params(&mut self, params: &mut HwParams, refining: bool) -> Result<()> {
        self.enforce_channels(params, refining)?;
        if self.slaves.len() == 1 {
            let mut slave = self.slaves[0].borrow_mut();
            return if refining {
                slave.hw_refine(params)
            } else {
                slave.hw_params(params)
            };
        }
        params.channels = Interval::single(2);
        let mut result = Ok(());
        for i in 0..self.slaves.len() {
            let mut slave = self.slaves[i].borrow_mut();
            result = if refining {
                slave.hw_refine(params)
            } else {
                slave.hw_params(params)
            };
            if result.is_err() {
                break;
            }
        }
        params.channels = Interval::single(self.layout.channel_count());
        result
    }

    /// Issue one non-interleaved transfer on every slave in index order
    /// and demand equal frame counts.
    fn fan_out_transfer<F>(&mut self, mut op: F) -> Result<u64>
    where
        F: FnMut(&mut dyn Pcm) -> Result<u64>,
    {
        let mut agreed: Option<u64> = None;
        for i in 0..self.slaves.len() {
            let count = op(&mut *self.slaves[i].borrow_mut())?;
            match agreed {
                None => agreed = Some(count),
                Some(prev) if prev != count => {
                    self.broken = true;
                    return Err(PcmError::StreamBroken);
                }
                Some(_) => {}
            }
        }
        agreed.ok_or(PcmError::BadState)
    }
}

impl Pcm for Surround {
    fn name(&self) -> &str {
        &self.name
    }

    fn stream(&self) -> Stream {
        self.stream
    }

    fn close(&mut self) -> Result<()> {
        let mut result = Ok(());
        for i in 0..self.slaves.len() {
            let r = self.slaves[i].borrow_mut().close();
            if result.is_ok() {
                result = r;
            }
        }
        result
    }

    fn info(&mut self) -> Result<Info> {
        Ok(Info {
            card: self.card,
            device: self.device,
            subdevice: 0,
            id: "Surround".into(),
            name: "Surround".into(),
            subname: "Surround".into(),
            stream: self.stream,
            subdevices_count: 1,
        })
    }

    fn hw_refine(&mut self, params: &mut HwParams) -> Result<()> {
        self.fan_out_params(params, true)
    }

    fn hw_params(&mut self, params: &mut HwParams) -> Result<()> {
        self.fan_out_params(params, false)
    }

    fn hw_free(&mut self) -> Result<()> {
        for i in 0..self.slaves.len() {
            self.slaves[i].borrow_mut().hw_free()?;
        }
        Ok(())
    }

    fn sw_params(&mut self, params: &SwParams) -> Result<()> {
        for i in 0..self.slaves.len() {
            self.slaves[i].borrow_mut().sw_params(params)?;
        }
        Ok(())
    }

    fn channel_info(&mut self, channel: u32) -> Result<ChannelInfo> {
        let pcms = self.slaves.len();
        if pcms == 1 || channel == 0 || channel == 1 {
            return self.slaves[0].borrow_mut().channel_info(channel);
        }
        if pcms > 1 && (channel == 2 || channel == 3) {
            return self.slaves[1].borrow_mut().channel_info(channel);
        }
        if pcms > 2 && (channel == 3 || channel == 4) {
            return self.slaves[2].borrow_mut().channel_info(channel);
        }
        Err(PcmError::BadArgument)
    }

    fn dump(&self, w: &mut dyn fmt::Write) -> fmt::Result {
        writeln!(w, "Surround PCM")?;
        writeln!(
            w,
            "  {} channels over {} streams",
            self.channels(),
            self.slaves.len()
        )
    }

    fn set_nonblock(&mut self, nonblock: bool) -> Result<()> {
        let mut result = Ok(());
        for i in 0..self.slaves.len() {
            let r = self.slaves[i].borrow_mut().set_nonblock(nonblock);
            if result.is_ok() {
                result = r;
            }
        }
        result
    }

    fn set_async(&mut self, sig: i32, pid: i32) -> Result<()> {
        self.slaves[0].borrow_mut().set_async(sig, pid)
    }

    fn status(&mut self) -> Result<Status> {
        let mut status = self.slaves[0].borrow_mut().status()?;
        if self.broken {
            status.state = State::Xrun;
        }
        Ok(status)
    }

    fn state(&mut self) -> State {
        if self.broken {
            return State::Xrun;
        }
        self.slaves[0].borrow_mut().state()
    }

    fn delay(&mut self) -> Result<i64> {
        self.slaves[0].borrow_mut().delay()
    }

    fn prepare(&mut self) -> Result<()> {
        self.slaves[0].borrow_mut().prepare()?;
        self.broken = false;
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.slaves[0].borrow_mut().reset()
    }

    fn start(&mut self) -> Result<()> {
        self.slaves[0].borrow_mut().start()
    }

    fn drop_pending(&mut self) -> Result<()> {
        self.slaves[0].borrow_mut().drop_pending()
    }

    fn drain(&mut self) -> Result<()> {
        self.slaves[0].borrow_mut().drain()
    }

    fn pause(&mut self, enable: bool) -> Result<()> {
        self.slaves[0].borrow_mut().pause(enable)
    }

    fn rewind(&mut self, frames: u64) -> Result<u64> {
        self.slaves[0].borrow_mut().rewind(frames)
    }

    fn writei(&mut self, buf: &[u8], frames: u64) -> Result<u64> {
        if self.slaves.len() == 1 {
            return self.slaves[0].borrow_mut().writei(buf, frames);
        }
        // Deinterleaving into per-pair streams is not wired up yet.
        Err(PcmError::Unimplemented)
    }

    fn writen(&mut self, bufs: &[&[u8]], frames: u64) -> Result<u64> {
        self.fan_out_transfer(|slave| slave.writen(bufs, frames))
    }

    fn readi(&mut self, buf: &mut [u8], frames: u64) -> Result<u64> {
        if self.slaves.len() == 1 {
            return self.slaves[0].borrow_mut().readi(buf, frames);
        }
        Err(PcmError::Unimplemented)
    }

    fn readn(&mut self, bufs: &mut [&mut [u8]], frames: u64) -> Result<u64> {
        let mut agreed: Option<u64> = None;
        for i in 0..self.slaves.len() {
            let count = self.slaves[i].borrow_mut().readn(bufs, frames)?;
            match agreed {
                None => agreed = Some(count),
                Some(prev) if prev != count => {
                    self.broken = true;
                    return Err(PcmError::StreamBroken);
                }
                Some(_) => {}
            }
        }
        agreed.ok_or(PcmError::BadState)
    }

    fn avail_update(&mut self) -> Result<u64> {
        self.slaves[0].borrow_mut().avail_update()
    }

    fn mmap_forward(&mut self, frames: u64) -> Result<u64> {
        self.fan_out_transfer(|slave| slave.mmap_forward(frames))
    }
}
