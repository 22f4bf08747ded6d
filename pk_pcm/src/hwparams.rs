//! Hardware-parameter blocks and their refinement algebra.
//!
//! A [`HwParams`] block describes a configuration *space*: masks for the
//! discrete dimensions (access, format) and intervals for the numeric
//! ones. Refinement narrows the space in place; committing to a single
//! configuration is the caller's final step.

use pk_core::{
    access::Access,
    error::{PcmError, Result},
    format::SampleFormat,
    interval::Interval,
    mask::{AccessMask, FormatMask},
};

use crate::pcm::SharedPcm;

/// One dimension of the hardware-parameter space.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Param {
    /// Frame-access layout (mask).
    Access = 0,
    /// Sample format (mask).
    Format,
    /// Channel count.
    Channels,
    /// Frame rate in Hz.
    Rate,
    /// Period duration in microseconds.
    PeriodTime,
    /// Period size in frames.
    PeriodSize,
    /// Periods per buffer.
    Periods,
    /// Buffer duration in microseconds.
    BufferTime,
    /// Buffer size in frames.
    BufferSize,
    /// Tick duration in microseconds.
    TickTime,
}

impl Param {
    /// Every dimension, in discriminant order.
    pub const ALL: [Param; 10] = [
        Param::Access,
        Param::Format,
        Param::Channels,
        Param::Rate,
        Param::PeriodTime,
        Param::PeriodSize,
        Param::Periods,
        Param::BufferTime,
        Param::BufferSize,
        Param::TickTime,
    ];

    /// Bit used to name this dimension in a link set.
    #[inline]
    pub const fn bit(self) -> u32 {
        1 << self as u32
    }

    /// Returns `true` for the mask-valued dimensions.
    #[inline]
    pub const fn is_mask(self) -> bool {
        matches!(self, Param::Access | Param::Format)
    }
}

/// A hardware-parameter configuration space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HwParams {
    /// Acceptable frame-access layouts.
    pub access: AccessMask,
    /// Acceptable sample formats.
    pub format: FormatMask,
    /// Acceptable channel counts.
    pub channels: Interval,
    /// Acceptable frame rates.
    pub rate: Interval,
    /// Acceptable period durations.
    pub period_time: Interval,
    /// Acceptable period sizes.
    pub period_size: Interval,
    /// Acceptable periods-per-buffer counts.
    pub periods: Interval,
    /// Acceptable buffer durations.
    pub buffer_time: Interval,
    /// Acceptable buffer sizes.
    pub buffer_size: Interval,
    /// Acceptable tick durations.
    pub tick_time: Interval,
    /// Capability bits of the node that refined this block.
    pub info: u32,
}

impl HwParams {
    /// The node supports direct memory mapping.
    pub const INFO_MMAP: u32 = 1 << 0;
    /// The mapped area carries valid sample data.
    pub const INFO_MMAP_VALID: u32 = 1 << 1;

    /// The unconstrained configuration space.
    pub fn any() -> Self {
        Self {
            access: AccessMask::any(),
            format: FormatMask::any(),
            channels: Interval::any(),
            rate: Interval::any(),
            period_time: Interval::any(),
            period_size: Interval::any(),
            periods: Interval::any(),
            buffer_time: Interval::any(),
            buffer_size: Interval::any(),
            tick_time: Interval::any(),
            info: Self::INFO_MMAP | Self::INFO_MMAP_VALID,
        }
    }

    /// The interval of a numeric dimension.
    ///
    /// # Panics
    /// Panics when `param` is a mask dimension.
    pub fn interval(&self, param: Param) -> &Interval {
        match param {
            Param::Channels => &self.channels,
            Param::Rate => &self.rate,
            Param::PeriodTime => &self.period_time,
            Param::PeriodSize => &self.period_size,
            Param::Periods => &self.periods,
            Param::BufferTime => &self.buffer_time,
            Param::BufferSize => &self.buffer_size,
            Param::TickTime => &self.tick_time,
            Param::Access | Param::Format => panic!("{param:?} is a mask dimension"),
        }
    }

    /// Mutable access to the interval of a numeric dimension.
    ///
    /// # Panics
    /// Panics when `param` is a mask dimension.
    pub fn interval_mut(&mut self, param: Param) -> &mut Interval {
        match param {
            Param::Channels => &mut self.channels,
            Param::Rate => &mut self.rate,
            Param::PeriodTime => &mut self.period_time,
            Param::PeriodSize => &mut self.period_size,
            Param::Periods => &mut self.periods,
            Param::BufferTime => &mut self.buffer_time,
            Param::BufferSize => &mut self.buffer_size,
            Param::TickTime => &mut self.tick_time,
            Param::Access | Param::Format => panic!("{param:?} is a mask dimension"),
        }
    }

    /// Returns `true` when the two blocks can never agree on `param`.
    pub fn never_eq(&self, param: Param, other: &HwParams) -> bool {
        match param {
            Param::Access => {
                let mut m = self.access;
                m.intersect(&other.access);
                m.is_empty()
            }
            Param::Format => {
                let mut m = self.format;
                m.intersect(&other.format);
                m.is_empty()
            }
            _ => {
                let mut i = *self.interval(param);
                i.refine(other.interval(param)).is_err()
            }
        }
    }

    /// Returns `true` when the two blocks always agree on `param`: both
    /// sides admit exactly one equal value.
    pub fn always_eq(&self, param: Param, other: &HwParams) -> bool {
        match param {
            Param::Access => {
                self.access.is_single() && self.access == other.access
            }
            Param::Format => {
                self.format.is_single() && self.format == other.format
            }
            _ => {
                let a = self.interval(param);
                let b = other.interval(param);
                a.is_single() && b.is_single() && a.value() == b.value()
            }
        }
    }

    /// Narrow every dimension named in `links` to its intersection with
    /// `other`'s.
    pub fn refine_linked(&mut self, other: &HwParams, links: u32) -> Result<()> {
        for param in Param::ALL {
            if links & param.bit() == 0 {
                continue;
            }
            match param {
                Param::Access => {
                    self.access.intersect(&other.access);
                    if self.access.is_empty() {
                        return Err(PcmError::Unsatisfiable);
                    }
                }
                Param::Format => {
                    self.format.intersect(&other.format);
                    if self.format.is_empty() {
                        return Err(PcmError::Unsatisfiable);
                    }
                }
                _ => {
                    self.interval_mut(param).refine(other.interval(param))?;
                }
            }
        }
        Ok(())
    }

    /// Validate the block without consulting any device: every dimension
    /// must still admit at least one value.
    pub fn refine_soft(&mut self) -> Result<()> {
        if self.access.is_empty() || self.format.is_empty() {
            return Err(PcmError::Unsatisfiable);
        }
        for param in Param::ALL {
            if param.is_mask() {
                continue;
            }
            if self.interval(param).is_empty() {
                return Err(PcmError::Unsatisfiable);
            }
        }
        Ok(())
    }

    /// First acceptable access layout. Callers pass refined blocks here.
    pub fn chosen_access(&self) -> Result<Access> {
        self.access.first().ok_or(PcmError::Unsatisfiable)
    }

    /// First acceptable sample format. Callers pass refined blocks here.
    pub fn chosen_format(&self) -> Result<SampleFormat> {
        self.format.first().ok_or(PcmError::Unsatisfiable)
    }

    /// The channel count of a refined block.
    pub fn chosen_channels(&self) -> Result<u32> {
        if self.channels.is_empty() {
            return Err(PcmError::Unsatisfiable);
        }
        Ok(self.channels.value())
    }

    /// The frame rate of a refined block.
    pub fn chosen_rate(&self) -> Result<u32> {
        if self.rate.is_empty() {
            return Err(PcmError::Unsatisfiable);
        }
        Ok(self.rate.value())
    }
}

impl Default for HwParams {
    fn default() -> Self {
        Self::any()
    }
}

/// Move `sparams`' `param` dimension as near as possible to `src`'s,
/// keeping the block consistent with what `slave` can refine.
///
/// When the two ranges overlap the dimension narrows to the overlap;
/// when they are disjoint the dimension snaps to the nearest value the
/// slave still accepts (the boundary just below the source range, or
/// just above, whichever is closer).
pub fn refine_near(slave: &SharedPcm, sparams: &mut HwParams, param: Param, src: &HwParams) -> Result<()> {
    let target = *src.interval(param);
    if target.is_empty() {
        return Err(PcmError::Unsatisfiable);
    }

    let mut trial = sparams.clone();
    if trial.interval_mut(param).refine(&target).is_ok()
        && slave.borrow_mut().hw_refine(&mut trial).is_ok()
    {
        *sparams = trial;
        return Ok(());
    }

    let mut below: Option<(HwParams, u32)> = None;
    if target.min() > 0 {
        let mut trial = sparams.clone();
        if trial.interval_mut(param).refine_max(target.min(), true).is_ok()
            && slave.borrow_mut().hw_refine(&mut trial).is_ok()
        {
            let v = trial.interval(param).max();
            below = Some((trial, v));
        }
    }
    let mut above: Option<(HwParams, u32)> = None;
    if target.max() < u32::MAX {
        let mut trial = sparams.clone();
        if trial.interval_mut(param).refine_min(target.max(), true).is_ok()
            && slave.borrow_mut().hw_refine(&mut trial).is_ok()
        {
            let v = trial.interval(param).min();
            above = Some((trial, v));
        }
    }

    let (mut chosen, v) = match (below, above) {
        (Some((bp, bv)), Some((ap, av))) => {
            let down = target.min().saturating_sub(bv);
            let up = av.saturating_sub(target.max());
            if down <= up { (bp, bv) } else { (ap, av) }
        }
        (Some(b), None) => b,
        (None, Some(a)) => a,
        (None, None) => return Err(PcmError::Unsatisfiable),
    };
    chosen.interval_mut(param).refine(&Interval::single(v))?;
    slave.borrow_mut().hw_refine(&mut chosen)?;
    *sparams = chosen;
    Ok(())
}

/// Intersect `sparams`' format mask with `mask` and revalidate the block
/// against `slave`.
pub fn set_format_mask(slave: &SharedPcm, sparams: &mut HwParams, mask: &FormatMask) -> Result<()> {
    sparams.format.intersect(mask);
    if sparams.format.is_empty() {
        return Err(PcmError::Unsatisfiable);
    }
    slave.borrow_mut().hw_refine(sparams)
}

/// Would `slave` accept `access` within the space of `sparams`?
pub fn test_access(slave: &SharedPcm, sparams: &HwParams, access: Access) -> bool {
    if !sparams.access.test(access) {
        return false;
    }
    let mut trial = sparams.clone();
    trial.access = AccessMask::of(&[access]);
    slave.borrow_mut().hw_refine(&mut trial).is_ok()
}

/// Narrow `sparams` to the first access layout (mmap layouts first) the
/// slave accepts, and return it.
pub fn set_access_first(slave: &SharedPcm, sparams: &mut HwParams) -> Result<Access> {
    for access in Access::ALL {
        if !sparams.access.test(access) {
            continue;
        }
        let mut trial = sparams.clone();
        trial.access = AccessMask::of(&[access]);
        if slave.borrow_mut().hw_refine(&mut trial).is_ok() {
            *sparams = trial;
            return Ok(access);
        }
    }
    Err(PcmError::Unsatisfiable)
}
