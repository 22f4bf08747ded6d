//! The plug node: chain planning, construction and teardown.

use std::{fmt, rc::Rc};

use pk_core::{
    access::Access,
    error::{PcmError, Result},
    format::SampleFormat,
    mask::{AccessMask, FormatMask},
};
use pk_pcm::{
    convert::ConverterSet,
    hwparams::{self, HwParams, Param},
    info::{ChannelInfo, Info},
    pcm::{Pcm, SharedPcm, Stream},
    refine::{SlaveRefine, refine_with_slave},
    route::{FULL, RouteMatrix, RouteWeight},
    state::{State, Status},
    swparams::SwParams,
};

use crate::format::slave_format;

/// The four-tuple a conversion stage reconciles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PlugParams {
    access: Access,
    format: SampleFormat,
    channels: u32,
    rate: u32,
}

/// One kind of conversion stage.
#[derive(Debug, Clone, Copy)]
enum Stage {
    Format,
    Channels,
    Rate,
    Access,
}

/// The fixed construction order. Channel routing and format conversion
/// appear twice so each can run on whichever side of the rate converter
/// its direction requires.
const STAGES: [Stage; 6] = [
    Stage::Format,
    Stage::Channels,
    Stage::Rate,
    Stage::Channels,
    Stage::Format,
    Stage::Access,
];

/// A transparent adapter in front of a slave device.
///
/// Until a hardware configuration is installed the plug is an identity
/// node. `hw_params` plans and builds the conversion chain; `hw_free`
/// (or the next `hw_params`) tears it back down. Fast operations always
/// reach the head of the current chain.
pub struct Plug {
    name: String,
    stream: Stream,
    req_slave: SharedPcm,
    close_slave: bool,
    current: SharedPcm,
    ttable: Option<RouteMatrix>,
    converters: Box<dyn ConverterSet>,
}

impl std::fmt::Debug for Plug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plug")
            .field("name", &self.name)
            .field("stream", &self.stream)
            .field("close_slave", &self.close_slave)
            .field("ttable", &self.ttable)
            .finish_non_exhaustive()
    }
}

impl Plug {
    /// Wrap `slave` in a plug.
    ///
    /// `ttable` overrides the synthesized channel-route matrix; the plug
    /// owns it from here on. `close_slave` decides whether closing the
    /// plug closes `slave` too. `converters` supplies the conversion
    /// stages the chain may need.
    pub fn open(
        name: impl Into<String>,
        ttable: Option<RouteMatrix>,
        slave: SharedPcm,
        close_slave: bool,
        converters: Box<dyn ConverterSet>,
    ) -> Plug {
        let stream = slave.borrow().stream();
        Plug {
            name: name.into(),
            stream,
            current: Rc::clone(&slave),
            req_slave: slave,
            close_slave,
            ttable,
            converters,
        }
    }

    /// Returns `true` while no conversion chain is installed.
    pub fn is_direct(&self) -> bool {
        Rc::ptr_eq(&self.current, &self.req_slave)
    }

    /// Tear the chain down to the requested slave.
    fn clear(&mut self) {
        if !self.is_direct() {
            log::debug!("plug {}: tearing down conversion chain", self.name);
            let _ = self.current.borrow_mut().close();
            self.current = Rc::clone(&self.req_slave);
        }
    }

    fn change_format(&mut self, clt: &PlugParams, slv: &mut PlugParams) -> Result<Option<SharedPcm>> {
        let cfmt;
        let node;
        let close = !self.is_direct();
        let downstream = Rc::clone(&self.current);
        if slv.format.is_linear() {
            // Toward a linear slave the stage runs last: rate and channel
            // changes carry linear formats along on their own.
            if clt.format == slv.format || clt.rate != slv.rate || clt.channels != slv.channels {
                return Ok(None);
            }
            cfmt = clt.format;
            node = match clt.format {
                SampleFormat::MuLaw => {
                    self.converters.open_mulaw(None, slv.format, downstream, close)?
                }
                SampleFormat::ALaw => {
                    self.converters.open_alaw(None, slv.format, downstream, close)?
                }
                SampleFormat::ImaAdpcm => {
                    self.converters.open_adpcm(None, slv.format, downstream, close)?
                }
                _ => self.converters.open_linear(None, slv.format, downstream, close)?,
            };
        } else {
            // A non-linear slave must be unwrapped before anything else
            // can run; the client side of the wrapper is linear.
            if clt.format == slv.format && clt.rate == slv.rate && clt.channels == slv.channels {
                return Ok(None);
            }
            cfmt = if clt.format.is_linear() {
                clt.format
            } else {
                SampleFormat::S16_NATIVE
            };
            node = match slv.format {
                SampleFormat::MuLaw => {
                    self.converters.open_mulaw(None, slv.format, downstream, close)?
                }
                SampleFormat::ALaw => {
                    self.converters.open_alaw(None, slv.format, downstream, close)?
                }
                SampleFormat::ImaAdpcm => {
                    self.converters.open_adpcm(None, slv.format, downstream, close)?
                }
                _ if slv.format.is_float() => {
                    self.converters.open_linear(None, slv.format, downstream, close)?
                }
                _ => return Err(PcmError::BadArgument),
            };
        }
        slv.format = cfmt;
        slv.access = clt.access;
        Ok(Some(node))
    }

    fn change_channels(&mut self, clt: &PlugParams, slv: &mut PlugParams) -> Result<Option<SharedPcm>> {
        if clt.channels == slv.channels {
            return Ok(None);
        }
        assert!(slv.format.is_linear());
        // Upmixing across a rate change belongs on the client side of the
        // rate converter; leave it for the second pass.
        if clt.rate != slv.rate && clt.channels > slv.channels {
            return Ok(None);
        }
        let ttable = match &self.ttable {
            Some(matrix) => matrix.clone(),
            None => default_route_matrix(self.stream, clt.channels, slv.channels),
        };
        let close = !self.is_direct();
        let downstream = Rc::clone(&self.current);
        let node = self
            .converters
            .open_route(None, slv.format, slv.channels, ttable, downstream, close)?;
        slv.channels = clt.channels;
        slv.access = clt.access;
        if clt.format.is_linear() {
            slv.format = clt.format;
        }
        Ok(Some(node))
    }

    fn change_rate(&mut self, clt: &PlugParams, slv: &mut PlugParams) -> Result<Option<SharedPcm>> {
        if clt.rate == slv.rate {
            return Ok(None);
        }
        assert!(slv.format.is_linear());
        let close = !self.is_direct();
        let downstream = Rc::clone(&self.current);
        let node = self
            .converters
            .open_rate(None, slv.format, slv.rate, downstream, close)?;
        slv.access = clt.access;
        slv.rate = clt.rate;
        if clt.format.is_linear() {
            slv.format = clt.format;
        }
        Ok(Some(node))
    }

    fn change_access(&mut self, clt: &PlugParams, slv: &mut PlugParams) -> Result<Option<SharedPcm>> {
        if clt.access == slv.access {
            return Ok(None);
        }
        let close = !self.is_direct();
        let downstream = Rc::clone(&self.current);
        let node = self.converters.open_copy(None, downstream, close)?;
        slv.access = clt.access;
        Ok(Some(node))
    }

    /// Run the stage sequence until the running slave tuple matches the
    /// client tuple. Any stage error tears the chain back down.
    fn insert_chain(&mut self, client: &PlugParams, slave: &PlugParams) -> Result<()> {
        let mut p = *slave;
        let mut k = 0;
        while p != *client {
            assert!(k < STAGES.len());
            let stage = STAGES[k];
            let inserted = match stage {
                Stage::Format => self.change_format(client, &mut p),
                Stage::Channels => self.change_channels(client, &mut p),
                Stage::Rate => self.change_rate(client, &mut p),
                Stage::Access => self.change_access(client, &mut p),
            };
            match inserted {
                Ok(Some(node)) => {
                    log::debug!("plug {}: inserted {stage:?} stage", self.name);
                    self.current = node;
                }
                Ok(None) => {}
                Err(err) => {
                    self.clear();
                    return Err(err);
                }
            }
            k += 1;
        }
        Ok(())
    }
}

impl SlaveRefine for Plug {
    fn cprepare(&mut self, _params: &mut HwParams) -> Result<()> {
        Ok(())
    }

    fn sprepare(&mut self, sparams: &mut HwParams) -> Result<()> {
        *sparams = HwParams::any();
        Ok(())
    }

    fn schange(&mut self, params: &mut HwParams, sparams: &mut HwParams) -> Result<()> {
        let mut links = Param::PeriodTime.bit() | Param::TickTime.bit();

        hwparams::refine_near(&self.req_slave, sparams, Param::Rate, params)?;
        hwparams::refine_near(&self.req_slave, sparams, Param::Channels, params)?;

        let mut sfmt_mask = FormatMask::none();
        for format in SampleFormat::ALL {
            if !params.format.test(format) {
                continue;
            }
            let f = if sparams.format.test(format) {
                Some(format)
            } else {
                slave_format(format, &sparams.format)
            };
            if let Some(f) = f {
                sfmt_mask.set(f);
            }
        }
        hwparams::set_format_mask(&self.req_slave, sparams, &sfmt_mask)?;

        if params.never_eq(Param::Format, sparams)
            || params.never_eq(Param::Channels, sparams)
            || params.never_eq(Param::Rate, sparams)
            || params.never_eq(Param::Access, sparams)
        {
            // A conversion will sit in between; the slave side only needs
            // a layout the chain can drive, and mmap is always there.
            sparams.access.intersect(&AccessMask::MMAP);
            if sparams.access.is_empty() {
                return Err(PcmError::Unsatisfiable);
            }
        }

        if params.always_eq(Param::Rate, sparams) {
            links |= Param::PeriodSize.bit() | Param::BufferSize.bit();
        } else {
            let mut buffer_size = params.buffer_size;
            buffer_size.unfloor();
            let scaled = buffer_size.muldiv(&sparams.rate, &params.rate);
            sparams.buffer_size.refine(&scaled)?;
        }
        sparams.refine_linked(params, links)
    }

    fn cchange(&mut self, params: &mut HwParams, sparams: &mut HwParams) -> Result<()> {
        let mut links = Param::PeriodTime.bit() | Param::TickTime.bit();

        let mut fmt_mask = FormatMask::none();
        for format in SampleFormat::ALL {
            if !params.format.test(format) {
                continue;
            }
            if sparams.format.test(format) || slave_format(format, &sparams.format).is_some() {
                fmt_mask.set(format);
            }
        }
        params.format.intersect(&fmt_mask);
        if params.format.is_empty() {
            return Err(PcmError::Unsatisfiable);
        }

        // Matching minima with different openness would ping-pong between
        // the two sides; adopt the slave's rounding.
        if params.rate.min() == sparams.rate.min()
            && sparams.rate.openmin()
            && !params.rate.openmin()
        {
            params.rate.refine_min(sparams.rate.min(), true)?;
        }

        if params.always_eq(Param::Rate, sparams) {
            links |= Param::PeriodSize.bit() | Param::BufferSize.bit();
        } else {
            let mut scaled = sparams.buffer_size.muldiv(&params.rate, &sparams.rate);
            scaled.floor();
            params.buffer_size.refine(&scaled)?;
        }
        params.refine_linked(sparams, links)?;

        // Conversions break any direct mapping the slave may offer.
        params.info &= !(HwParams::INFO_MMAP | HwParams::INFO_MMAP_VALID);
        Ok(())
    }

    fn srefine(&mut self, sparams: &mut HwParams) -> Result<()> {
        self.req_slave.borrow_mut().hw_refine(sparams)
    }
}

impl Pcm for Plug {
    fn name(&self) -> &str {
        &self.name
    }

    fn stream(&self) -> Stream {
        self.stream
    }

    fn close(&mut self) -> Result<()> {
        self.clear();
        if self.close_slave {
            self.req_slave.borrow_mut().close()
        } else {
            Ok(())
        }
    }

    fn info(&mut self) -> Result<Info> {
        self.req_slave.borrow_mut().info()
    }

    fn hw_refine(&mut self, params: &mut HwParams) -> Result<()> {
        refine_with_slave(self, params)
    }

    fn hw_params(&mut self, params: &mut HwParams) -> Result<()> {
        let mut sparams = HwParams::any();
        self.sprepare(&mut sparams)?;
        self.schange(params, &mut sparams)?;
        sparams.refine_soft()?;

        let clt = PlugParams {
            access: params.chosen_access()?,
            format: params.chosen_format()?,
            channels: params.chosen_channels()?,
            rate: params.chosen_rate()?,
        };
        let mut slv = PlugParams {
            access: clt.access,
            format: sparams.chosen_format()?,
            channels: sparams.chosen_channels()?,
            rate: sparams.chosen_rate()?,
        };

        self.clear();
        let direct = clt.format == slv.format
            && clt.channels == slv.channels
            && clt.rate == slv.rate
            && hwparams::test_access(&self.req_slave, &sparams, clt.access);
        if !direct {
            slv.access = hwparams::set_access_first(&self.req_slave, &mut sparams)?;
            self.insert_chain(&clt, &slv)?;
        }

        let result = self.current.borrow_mut().hw_params(params);
        if let Err(err) = result {
            self.clear();
            return Err(err);
        }
        Ok(())
    }

    fn hw_free(&mut self) -> Result<()> {
        let result = self.current.borrow_mut().hw_free();
        self.clear();
        result
    }

    fn sw_params(&mut self, params: &SwParams) -> Result<()> {
        self.current.borrow_mut().sw_params(params)
    }

    fn channel_info(&mut self, channel: u32) -> Result<ChannelInfo> {
        self.current.borrow_mut().channel_info(channel)
    }

    fn dump(&self, w: &mut dyn fmt::Write) -> fmt::Result {
        write!(w, "Plug PCM: ")?;
        self.current.borrow().dump(w)
    }

    fn set_nonblock(&mut self, nonblock: bool) -> Result<()> {
        self.current.borrow_mut().set_nonblock(nonblock)
    }

    fn set_async(&mut self, sig: i32, pid: i32) -> Result<()> {
        self.current.borrow_mut().set_async(sig, pid)
    }

    fn status(&mut self) -> Result<Status> {
        self.current.borrow_mut().status()
    }

    fn state(&mut self) -> State {
        self.current.borrow_mut().state()
    }

    fn delay(&mut self) -> Result<i64> {
        self.current.borrow_mut().delay()
    }

    fn prepare(&mut self) -> Result<()> {
        self.current.borrow_mut().prepare()
    }

    fn reset(&mut self) -> Result<()> {
        self.current.borrow_mut().reset()
    }

    fn start(&mut self) -> Result<()> {
        self.current.borrow_mut().start()
    }

    fn drop_pending(&mut self) -> Result<()> {
        self.current.borrow_mut().drop_pending()
    }

    fn drain(&mut self) -> Result<()> {
        self.current.borrow_mut().drain()
    }

    fn pause(&mut self, enable: bool) -> Result<()> {
        self.current.borrow_mut().pause(enable)
    }

    fn rewind(&mut self, frames: u64) -> Result<u64> {
        self.current.borrow_mut().rewind(frames)
    }

    fn writei(&mut self, buf: &[u8], frames: u64) -> Result<u64> {
        self.current.borrow_mut().writei(buf, frames)
    }

    fn writen(&mut self, bufs: &[&[u8]], frames: u64) -> Result<u64> {
        self.current.borrow_mut().writen(bufs, frames)
    }

    fn readi(&mut self, buf: &mut [u8], frames: u64) -> Result<u64> {
        self.current.borrow_mut().readi(buf, frames)
    }

    fn readn(&mut self, bufs: &mut [&mut [u8]], frames: u64) -> Result<u64> {
        self.current.borrow_mut().readn(bufs, frames)
    }

    fn avail_update(&mut self) -> Result<u64> {
        self.current.borrow_mut().avail_update()
    }

    fn mmap_forward(&mut self, frames: u64) -> Result<u64> {
        self.current.borrow_mut().mmap_forward(frames)
    }
}

/// Synthesize the default route matrix: unit entries on the cyclic
/// diagonal, scaled down where several sources meet in one destination.
fn default_route_matrix(stream: Stream, cchannels: u32, schannels: u32) -> RouteMatrix {
    let mut matrix = RouteMatrix::zeroed(cchannels as usize, schannels as usize);
    let mut c = 0usize;
    let mut s = 0usize;
    let mut n = cchannels.max(schannels);
    while n > 0 {
        let mut v = FULL;
        if stream == Stream::Playback && cchannels > schannels {
            let mut srcs = cchannels / schannels;
            if (s as u32) < cchannels % schannels {
                srcs += 1;
            }
            v /= srcs as RouteWeight;
        } else if stream == Stream::Capture && schannels > cchannels {
            let mut srcs = schannels / cchannels;
            if (s as u32) < schannels % cchannels {
                srcs += 1;
            }
            v /= srcs as RouteWeight;
        }
        matrix.set(c, s, v);
        c += 1;
        if c == cchannels as usize {
            c = 0;
        }
        s += 1;
        if s == schannels as usize {
            s = 0;
        }
        n -= 1;
    }
    matrix
}
