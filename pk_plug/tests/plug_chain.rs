//! Integration tests for plug chain planning and construction.

use std::{cell::RefCell, fmt, rc::Rc};

use pk_core::{
    access::Access,
    error::{PcmError, Result},
    format::SampleFormat,
    interval::Interval,
    mask::{AccessMask, FormatMask},
};
use pk_pcm::{
    convert::ConverterSet,
    hwparams::HwParams,
    info::{ChannelInfo, Info},
    null::{Caps, NullPcm},
    pcm::{Mode, Pcm, SharedPcm, Stream},
    route::{FULL, RouteMatrix},
    state::{State, Status},
    swparams::SwParams,
};
use pk_plug::Plug;
use serde_json::json;

/// What a conversion factory was asked to build.
#[derive(Debug, Clone, PartialEq)]
enum StageRecord {
    Linear { slave_format: SampleFormat },
    MuLaw { slave_format: SampleFormat },
    ALaw { slave_format: SampleFormat },
    Adpcm { slave_format: SampleFormat },
    Rate { slave_format: SampleFormat, slave_rate: u32 },
    Route { slave_format: SampleFormat, slave_channels: u32, ttable: RouteMatrix },
    Copy,
}

/// A stand-in conversion node: remembers its slave and its ownership of
/// it, accepts any configuration, and forwards nothing.
struct Wrapper {
    label: &'static str,
    stream: Stream,
    slave: SharedPcm,
    close_slave: bool,
    closed: bool,
}

impl Wrapper {
    fn open(label: &'static str, slave: SharedPcm, close_slave: bool) -> Rc<RefCell<Wrapper>> {
        let stream = slave.borrow().stream();
        Rc::new(RefCell::new(Wrapper {
            label,
            stream,
            slave,
            close_slave,
            closed: false,
        }))
    }
}

impl Pcm for Wrapper {
    fn name(&self) -> &str {
        self.label
    }

    fn stream(&self) -> Stream {
        self.stream
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        if self.close_slave {
            self.slave.borrow_mut().close()
        } else {
            Ok(())
        }
    }

    fn info(&mut self) -> Result<Info> {
        self.slave.borrow_mut().info()
    }

    fn hw_refine(&mut self, _params: &mut HwParams) -> Result<()> {
        Ok(())
    }

    fn hw_params(&mut self, _params: &mut HwParams) -> Result<()> {
        Ok(())
    }

    fn hw_free(&mut self) -> Result<()> {
        Ok(())
    }

    fn sw_params(&mut self, _params: &SwParams) -> Result<()> {
        Ok(())
    }

    fn channel_info(&mut self, channel: u32) -> Result<ChannelInfo> {
        Ok(ChannelInfo { channel, first: 0, step: 0 })
    }

    fn dump(&self, w: &mut dyn fmt::Write) -> fmt::Result {
        writeln!(w, "{} wrapper", self.label)
    }

    fn set_nonblock(&mut self, nonblock: bool) -> Result<()> {
        self.slave.borrow_mut().set_nonblock(nonblock)
    }

    fn set_async(&mut self, _sig: i32, _pid: i32) -> Result<()> {
        Ok(())
    }

    fn status(&mut self) -> Result<Status> {
        Ok(Status::default())
    }

    fn state(&mut self) -> State {
        State::Setup
    }

    fn delay(&mut self) -> Result<i64> {
        Ok(0)
    }

    fn prepare(&mut self) -> Result<()> {
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn drop_pending(&mut self) -> Result<()> {
        Ok(())
    }

    fn drain(&mut self) -> Result<()> {
        Ok(())
    }

    fn pause(&mut self, _enable: bool) -> Result<()> {
        Ok(())
    }

    fn rewind(&mut self, _frames: u64) -> Result<u64> {
        Ok(0)
    }

    fn writei(&mut self, _buf: &[u8], frames: u64) -> Result<u64> {
        Ok(frames)
    }

    fn writen(&mut self, _bufs: &[&[u8]], frames: u64) -> Result<u64> {
        Ok(frames)
    }

    fn readi(&mut self, _buf: &mut [u8], frames: u64) -> Result<u64> {
        Ok(frames)
    }

    fn readn(&mut self, _bufs: &mut [&mut [u8]], frames: u64) -> Result<u64> {
        Ok(frames)
    }

    fn avail_update(&mut self) -> Result<u64> {
        Ok(0)
    }

    fn mmap_forward(&mut self, frames: u64) -> Result<u64> {
        Ok(frames)
    }
}

#[derive(Default, Clone)]
struct Recorder {
    stages: Rc<RefCell<Vec<StageRecord>>>,
    wrappers: Rc<RefCell<Vec<Rc<RefCell<Wrapper>>>>>,
}

impl Recorder {
    fn stages(&self) -> Vec<StageRecord> {
        self.stages.borrow().clone()
    }

    fn wrapper_count(&self) -> usize {
        self.wrappers.borrow().len()
    }

    fn all_wrappers_closed(&self) -> bool {
        self.wrappers.borrow().iter().all(|w| w.borrow().closed)
    }
}

/// Records every factory call and hands out [`Wrapper`] nodes. An
/// optional failure point makes one factory refuse.
struct TrackingConverters {
    recorder: Recorder,
    fail_on_rate: bool,
}

impl TrackingConverters {
    fn boxed(recorder: &Recorder) -> Box<dyn ConverterSet> {
        Box::new(TrackingConverters {
            recorder: recorder.clone(),
            fail_on_rate: false,
        })
    }

    fn failing_rate(recorder: &Recorder) -> Box<dyn ConverterSet> {
        Box::new(TrackingConverters {
            recorder: recorder.clone(),
            fail_on_rate: true,
        })
    }

    fn build(&mut self, label: &'static str, record: StageRecord, slave: SharedPcm, close_slave: bool) -> Result<SharedPcm> {
        self.recorder.stages.borrow_mut().push(record);
        let wrapper = Wrapper::open(label, slave, close_slave);
        self.recorder.wrappers.borrow_mut().push(Rc::clone(&wrapper));
        Ok(wrapper)
    }
}

impl ConverterSet for TrackingConverters {
    fn open_linear(
        &mut self,
        _name: Option<&str>,
        slave_format: SampleFormat,
        slave: SharedPcm,
        close_slave: bool,
    ) -> Result<SharedPcm> {
        self.build("linear", StageRecord::Linear { slave_format }, slave, close_slave)
    }

    fn open_mulaw(
        &mut self,
        _name: Option<&str>,
        slave_format: SampleFormat,
        slave: SharedPcm,
        close_slave: bool,
    ) -> Result<SharedPcm> {
        self.build("mulaw", StageRecord::MuLaw { slave_format }, slave, close_slave)
    }

    fn open_alaw(
        &mut self,
        _name: Option<&str>,
        slave_format: SampleFormat,
        slave: SharedPcm,
        close_slave: bool,
    ) -> Result<SharedPcm> {
        self.build("alaw", StageRecord::ALaw { slave_format }, slave, close_slave)
    }

    fn open_adpcm(
        &mut self,
        _name: Option<&str>,
        slave_format: SampleFormat,
        slave: SharedPcm,
        close_slave: bool,
    ) -> Result<SharedPcm> {
        self.build("adpcm", StageRecord::Adpcm { slave_format }, slave, close_slave)
    }

    fn open_rate(
        &mut self,
        _name: Option<&str>,
        slave_format: SampleFormat,
        slave_rate: u32,
        slave: SharedPcm,
        close_slave: bool,
    ) -> Result<SharedPcm> {
        if self.fail_on_rate {
            return Err(PcmError::NoMemory);
        }
        self.build("rate", StageRecord::Rate { slave_format, slave_rate }, slave, close_slave)
    }

    fn open_route(
        &mut self,
        _name: Option<&str>,
        slave_format: SampleFormat,
        slave_channels: u32,
        ttable: RouteMatrix,
        slave: SharedPcm,
        close_slave: bool,
    ) -> Result<SharedPcm> {
        self.build(
            "route",
            StageRecord::Route { slave_format, slave_channels, ttable },
            slave,
            close_slave,
        )
    }

    fn open_copy(
        &mut self,
        _name: Option<&str>,
        slave: SharedPcm,
        close_slave: bool,
    ) -> Result<SharedPcm> {
        self.build("copy", StageRecord::Copy, slave, close_slave)
    }
}

fn device(access: AccessMask, format: SampleFormat, channels: u32, rate: u32) -> Rc<RefCell<NullPcm>> {
    Rc::new(RefCell::new(NullPcm::new(
        "slave",
        Stream::Playback,
        Caps {
            access,
            formats: FormatMask::of(&[format]),
            channels: Interval::single(channels),
            rates: Interval::single(rate),
        },
    )))
}

fn client_params(access: Access, format: SampleFormat, channels: u32, rate: u32) -> HwParams {
    let mut params = HwParams::any();
    params.access = AccessMask::of(&[access]);
    params.format = FormatMask::of(&[format]);
    params.channels = Interval::single(channels);
    params.rate = Interval::single(rate);
    params
}

#[test]
fn test_identity_builds_no_wrappers() {
    let slave = device(AccessMask::any(), SampleFormat::S16Le, 2, 48000);
    let recorder = Recorder::default();
    let mut plug = Plug::open(
        "plug",
        None,
        slave.clone() as SharedPcm,
        true,
        TrackingConverters::boxed(&recorder),
    );

    let mut params = client_params(Access::RwInterleaved, SampleFormat::S16Le, 2, 48000);
    plug.hw_params(&mut params).unwrap();

    assert!(plug.is_direct());
    assert!(recorder.stages().is_empty());
    assert!(slave.borrow().setup().is_some());
}

#[test]
fn test_access_repack_only() {
    // Scenario: same format/channels/rate, but the device only does
    // non-interleaved mmap while the client writes interleaved frames.
    let slave = device(
        AccessMask::of(&[Access::MmapNoninterleaved]),
        SampleFormat::S16Le,
        2,
        48000,
    );
    let recorder = Recorder::default();
    let mut plug = Plug::open(
        "plug",
        None,
        slave as SharedPcm,
        true,
        TrackingConverters::boxed(&recorder),
    );

    let mut params = client_params(Access::RwInterleaved, SampleFormat::S16Le, 2, 48000);
    plug.hw_params(&mut params).unwrap();

    assert_eq!(recorder.stages(), vec![StageRecord::Copy]);
    assert!(!plug.is_direct());
}

#[test]
fn test_float_client_gets_format_then_rate() {
    // Scenario: float client at 44100 against an integer device at
    // 48000. The rate converter runs at the device side in S16; a linear
    // converter faces the client.
    let slave = device(AccessMask::any(), SampleFormat::S16Le, 2, 48000);
    let recorder = Recorder::default();
    let mut plug = Plug::open(
        "plug",
        None,
        slave as SharedPcm,
        true,
        TrackingConverters::boxed(&recorder),
    );

    let mut params = client_params(Access::RwInterleaved, SampleFormat::FloatLe, 2, 44100);
    plug.hw_params(&mut params).unwrap();

    assert_eq!(
        recorder.stages(),
        vec![
            StageRecord::Rate { slave_format: SampleFormat::S16Le, slave_rate: 48000 },
            StageRecord::Linear { slave_format: SampleFormat::S16Le },
        ]
    );
}

#[test]
fn test_mulaw_mono_8k_client_full_chain() {
    // Scenario: telephone-style client against a stereo 48 kHz device:
    // route 1->2, rate 8000->48000, and a mu-law expander facing the
    // client.
    let slave = device(AccessMask::any(), SampleFormat::S16Le, 2, 48000);
    let recorder = Recorder::default();
    let mut plug = Plug::open(
        "plug",
        None,
        slave as SharedPcm,
        true,
        TrackingConverters::boxed(&recorder),
    );

    let mut params = client_params(Access::RwInterleaved, SampleFormat::MuLaw, 1, 8000);
    plug.hw_params(&mut params).unwrap();

    let stages = recorder.stages();
    assert_eq!(stages.len(), 3);
    match &stages[0] {
        StageRecord::Route { slave_format, slave_channels, ttable } => {
            assert_eq!(*slave_format, SampleFormat::S16Le);
            assert_eq!(*slave_channels, 2);
            assert_eq!(ttable.cused(), 1);
            assert_eq!(ttable.sused(), 2);
            assert_eq!(ttable.get(0, 0), FULL);
            assert_eq!(ttable.get(0, 1), FULL);
        }
        other => panic!("expected a route stage, got {other:?}"),
    }
    assert_eq!(
        stages[1],
        StageRecord::Rate { slave_format: SampleFormat::S16Le, slave_rate: 48000 }
    );
    assert_eq!(stages[2], StageRecord::MuLaw { slave_format: SampleFormat::S16Le });
}

#[test]
fn test_quad_client_downmixes_with_half_gain() {
    let slave = device(AccessMask::any(), SampleFormat::S16Le, 2, 48000);
    let recorder = Recorder::default();
    let mut plug = Plug::open(
        "plug",
        None,
        slave as SharedPcm,
        true,
        TrackingConverters::boxed(&recorder),
    );

    let mut params = client_params(Access::RwInterleaved, SampleFormat::S16Le, 4, 48000);
    plug.hw_params(&mut params).unwrap();

    let stages = recorder.stages();
    assert_eq!(stages.len(), 1);
    match &stages[0] {
        StageRecord::Route { ttable, .. } => {
            assert_eq!(ttable.cused(), 4);
            assert_eq!(ttable.sused(), 2);
            assert_eq!(ttable.get(0, 0), FULL / 2);
            assert_eq!(ttable.get(1, 1), FULL / 2);
            assert_eq!(ttable.get(2, 0), FULL / 2);
            assert_eq!(ttable.get(3, 1), FULL / 2);
            assert_eq!(ttable.get(0, 1), 0);
            assert_eq!(ttable.get(2, 1), 0);
        }
        other => panic!("expected a route stage, got {other:?}"),
    }
}

#[test]
fn test_hw_free_tears_the_chain_down() {
    let slave = device(AccessMask::any(), SampleFormat::S16Le, 2, 48000);
    let recorder = Recorder::default();
    let mut plug = Plug::open(
        "plug",
        None,
        slave.clone() as SharedPcm,
        false,
        TrackingConverters::boxed(&recorder),
    );

    let mut params = client_params(Access::RwInterleaved, SampleFormat::MuLaw, 1, 8000);
    plug.hw_params(&mut params).unwrap();
    assert!(!plug.is_direct());
    assert_eq!(recorder.wrapper_count(), 3);

    plug.hw_free().unwrap();
    assert!(plug.is_direct());
    assert!(recorder.all_wrappers_closed());
    assert!(!slave.borrow().is_closed());
}

#[test]
fn test_failed_stage_restores_the_identity_chain() {
    let slave = device(AccessMask::any(), SampleFormat::S16Le, 2, 48000);
    let recorder = Recorder::default();
    let mut plug = Plug::open(
        "plug",
        None,
        slave.clone() as SharedPcm,
        true,
        TrackingConverters::failing_rate(&recorder),
    );

    let mut params = client_params(Access::RwInterleaved, SampleFormat::MuLaw, 1, 8000);
    assert_eq!(plug.hw_params(&mut params), Err(PcmError::NoMemory));

    assert!(plug.is_direct());
    // The route stage went in before the rate stage refused; teardown
    // must have closed it again.
    assert_eq!(recorder.wrapper_count(), 1);
    assert!(recorder.all_wrappers_closed());
    assert!(!slave.borrow().is_closed());
}

#[test]
fn test_close_respects_slave_ownership() {
    let recorder = Recorder::default();

    let borrowed = device(AccessMask::any(), SampleFormat::S16Le, 2, 48000);
    let mut plug = Plug::open(
        "plug",
        None,
        borrowed.clone() as SharedPcm,
        false,
        TrackingConverters::boxed(&recorder),
    );
    plug.close().unwrap();
    assert!(!borrowed.borrow().is_closed());

    let owned = device(AccessMask::any(), SampleFormat::S16Le, 2, 48000);
    let mut plug = Plug::open(
        "plug",
        None,
        owned.clone() as SharedPcm,
        true,
        TrackingConverters::boxed(&recorder),
    );
    plug.close().unwrap();
    assert!(owned.borrow().is_closed());
}

#[test]
fn test_refine_is_idempotent() {
    let slave = device(AccessMask::any(), SampleFormat::S16Le, 2, 48000);
    let recorder = Recorder::default();
    let mut plug = Plug::open(
        "plug",
        None,
        slave as SharedPcm,
        true,
        TrackingConverters::boxed(&recorder),
    );

    let mut params = HwParams::any();
    params.access = AccessMask::of(&[Access::RwInterleaved]);
    params.format = FormatMask::of(&[SampleFormat::FloatLe, SampleFormat::S16Le]);
    params.channels = Interval::new(1, 8);
    params.rate = Interval::new(8000, 96000);

    plug.hw_refine(&mut params).unwrap();
    let first = params.clone();
    plug.hw_refine(&mut params).unwrap();
    assert_eq!(params, first);
}

#[test]
fn test_refine_keeps_convertible_client_formats() {
    let slave = device(AccessMask::any(), SampleFormat::S16Le, 2, 48000);
    let recorder = Recorder::default();
    let mut plug = Plug::open(
        "plug",
        None,
        slave as SharedPcm,
        true,
        TrackingConverters::boxed(&recorder),
    );

    let mut params = HwParams::any();
    plug.hw_refine(&mut params).unwrap();

    // Every client format with a conversion path to S16_LE survives.
    assert!(params.format.test(SampleFormat::FloatLe));
    assert!(params.format.test(SampleFormat::MuLaw));
    assert!(params.format.test(SampleFormat::S16Le));
    // Direct mapping does not survive a conversion layer.
    assert_eq!(params.info & HwParams::INFO_MMAP, 0);
}

struct FixedResolver {
    slave: SharedPcm,
    seen: Option<serde_json::Value>,
}

impl pk_pcm::config::SlaveResolver for FixedResolver {
    fn open_slave(
        &mut self,
        conf: &serde_json::Value,
        _stream: Stream,
        _mode: Mode,
    ) -> Result<SharedPcm> {
        self.seen = Some(conf.clone());
        Ok(Rc::clone(&self.slave))
    }
}

#[test]
fn test_config_ttable_is_used_verbatim() {
    // A 2x4 matrix supplied in the configuration overrides synthesis.
    let slave = device(AccessMask::any(), SampleFormat::S16Le, 4, 48000);
    let recorder = Recorder::default();
    let tt = json!({
        "0": { "0": 0.5, "2": 0.5 },
        "1": { "1": 0.5, "3": 0.5 },
    });
    let conf = json!({
        "comment": "spread stereo over four speakers",
        "slave": { "pcm": "hw:0,0" },
        "ttable": tt,
    });
    let mut resolver = FixedResolver { slave: slave as SharedPcm, seen: None };
    let mut plug = Plug::from_config(
        "plug",
        &conf,
        Stream::Playback,
        Mode::Blocking,
        &mut resolver,
        TrackingConverters::boxed(&recorder),
    )
    .unwrap();
    assert_eq!(resolver.seen, Some(json!({ "pcm": "hw:0,0" })));

    let mut params = client_params(Access::RwInterleaved, SampleFormat::S16Le, 2, 48000);
    plug.hw_params(&mut params).unwrap();

    let expected = RouteMatrix::from_config(&tt).unwrap();
    let stages = recorder.stages();
    assert_eq!(stages.len(), 1);
    match &stages[0] {
        StageRecord::Route { ttable, .. } => {
            assert_eq!(*ttable, expected);
            assert_eq!(ttable.get(0, 0), FULL / 2);
            assert_eq!(ttable.get(0, 2), FULL / 2);
        }
        other => panic!("expected a route stage, got {other:?}"),
    }
}

#[test]
fn test_config_rejects_unknown_fields_and_missing_slave() {
    let slave = device(AccessMask::any(), SampleFormat::S16Le, 2, 48000);
    let recorder = Recorder::default();
    let mut resolver = FixedResolver { slave: slave as SharedPcm, seen: None };

    let conf = json!({ "slave": {}, "route_policy": "average" });
    let err = Plug::from_config(
        "plug",
        &conf,
        Stream::Playback,
        Mode::Blocking,
        &mut resolver,
        TrackingConverters::boxed(&recorder),
    )
    .unwrap_err();
    assert!(matches!(err, PcmError::BadConfig(_)));

    let conf = json!({ "ttable": { "0": { "0": 1 } } });
    let err = Plug::from_config(
        "plug",
        &conf,
        Stream::Playback,
        Mode::Blocking,
        &mut resolver,
        TrackingConverters::boxed(&recorder),
    )
    .unwrap_err();
    assert_eq!(err, PcmError::BadConfig("slave is not defined".into()));
}
