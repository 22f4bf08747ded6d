//! Slave-format selection.
//!
//! Given a client format and the set of formats a slave accepts, pick the
//! slave format a conversion can target. The choice never widens more
//! than necessary and gives up endianness before signedness, and
//! signedness before width.

use pk_core::{format::SampleFormat, mask::FormatMask};

const LINEAR_PREFERRED_LE: [SampleFormat; 14] = [
    SampleFormat::S16Le,
    SampleFormat::U16Le,
    SampleFormat::S16Be,
    SampleFormat::U16Be,
    SampleFormat::S24Le,
    SampleFormat::U24Le,
    SampleFormat::S24Be,
    SampleFormat::U24Be,
    SampleFormat::S32Le,
    SampleFormat::U32Le,
    SampleFormat::S32Be,
    SampleFormat::U32Be,
    SampleFormat::S8,
    SampleFormat::U8,
];

const LINEAR_PREFERRED_BE: [SampleFormat; 14] = [
    SampleFormat::S16Be,
    SampleFormat::U16Be,
    SampleFormat::S16Le,
    SampleFormat::U16Le,
    SampleFormat::S24Be,
    SampleFormat::U24Be,
    SampleFormat::S24Le,
    SampleFormat::U24Le,
    SampleFormat::S32Be,
    SampleFormat::U32Be,
    SampleFormat::S32Le,
    SampleFormat::U32Le,
    SampleFormat::S8,
    SampleFormat::U8,
];

const COMPANDED_PREFERRED: [SampleFormat; 3] =
    [SampleFormat::MuLaw, SampleFormat::ALaw, SampleFormat::ImaAdpcm];

fn linear_preferred() -> &'static [SampleFormat; 14] {
    if cfg!(target_endian = "big") {
        &LINEAR_PREFERRED_BE
    } else {
        &LINEAR_PREFERRED_LE
    }
}

/// Choose the slave format a conversion from `format` can target within
/// `mask`. Returns `None` when no conversion path exists.
pub fn slave_format(format: SampleFormat, mask: &FormatMask) -> Option<SampleFormat> {
    if mask.test(format) {
        return Some(format);
    }
    if format.is_companded() {
        // A companded client needs a linear target to expand into.
        return linear_preferred().iter().copied().find(|f| mask.test(*f));
    }

    let mut linear = FormatMask::LINEAR;
    linear.intersect(mask);
    if linear.is_empty() {
        return COMPANDED_PREFERRED.iter().copied().find(|f| mask.test(*f));
    }

    let width = format.width() as i32;
    let unsigned = format.is_unsigned();
    let big_endian = format.is_big_endian();
    let mut w = width;
    let mut dw = 8;
    for _ in 0..4 {
        let mut e = big_endian;
        for _ in 0..2 {
            let mut u = unsigned;
            for _ in 0..2 {
                if w > 0 {
                    if let Some(f) = SampleFormat::build_linear(w as u32, u, e) {
                        if mask.test(f) {
                            return Some(f);
                        }
                    }
                }
                u = !u;
            }
            e = !e;
        }
        if w < 32 {
            w += dw;
        } else {
            w = width - 8;
            dw = -8;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_when_accepted() {
        for format in SampleFormat::ALL {
            let mask = FormatMask::of(&[format]);
            assert_eq!(slave_format(format, &mask), Some(format));
        }
    }

    #[test]
    fn test_never_widens_past_a_same_width_target() {
        let mask = FormatMask::of(&[SampleFormat::U16Be, SampleFormat::S32Le]);
        assert_eq!(slave_format(SampleFormat::S16Le, &mask), Some(SampleFormat::U16Be));
    }

    #[test]
    fn test_keeps_endianness_in_preference_to_signedness() {
        // Flipping signedness costs less than flipping byte order.
        let mask = FormatMask::of(&[SampleFormat::U16Le, SampleFormat::S16Be]);
        assert_eq!(slave_format(SampleFormat::S16Le, &mask), Some(SampleFormat::U16Le));
    }

    #[test]
    fn test_keeps_width_last() {
        // Even a fully flipped same-width target beats changing width.
        let mask = FormatMask::of(&[SampleFormat::U16Be, SampleFormat::S24Le]);
        assert_eq!(slave_format(SampleFormat::S16Le, &mask), Some(SampleFormat::U16Be));
    }

    #[test]
    fn test_widens_before_narrowing() {
        let mask = FormatMask::of(&[SampleFormat::S8, SampleFormat::S24Le]);
        assert_eq!(slave_format(SampleFormat::S16Le, &mask), Some(SampleFormat::S24Le));
    }

    #[test]
    fn test_narrows_from_the_top() {
        let mask = FormatMask::of(&[SampleFormat::S24Le]);
        assert_eq!(slave_format(SampleFormat::S32Le, &mask), Some(SampleFormat::S24Le));
        let mask = FormatMask::of(&[SampleFormat::S8]);
        assert_eq!(slave_format(SampleFormat::S32Le, &mask), Some(SampleFormat::S8));
    }

    #[test]
    fn test_companded_client_takes_preferred_linear() {
        let mask = FormatMask::of(&[SampleFormat::U8, SampleFormat::S16Le, SampleFormat::S32Be]);
        assert_eq!(slave_format(SampleFormat::MuLaw, &mask), Some(SampleFormat::S16Le));
    }

    #[test]
    fn test_companded_client_without_linear_target_fails() {
        let mask = FormatMask::of(&[SampleFormat::ALaw]);
        assert_eq!(slave_format(SampleFormat::MuLaw, &mask), None);
    }

    #[test]
    fn test_linear_client_against_companded_slave() {
        let mask = FormatMask::of(&[SampleFormat::ALaw, SampleFormat::ImaAdpcm]);
        assert_eq!(slave_format(SampleFormat::S16Le, &mask), Some(SampleFormat::ALaw));
    }

    #[test]
    fn test_float_client_lands_on_sixteen_bits() {
        let mask = FormatMask::of(&[SampleFormat::S16Le]);
        assert_eq!(slave_format(SampleFormat::FloatLe, &mask), Some(SampleFormat::S16Le));
    }

    #[test]
    fn test_float_client_prefers_thirty_two_bits() {
        let mask = FormatMask::of(&[SampleFormat::S16Le, SampleFormat::S32Le]);
        assert_eq!(slave_format(SampleFormat::FloatLe, &mask), Some(SampleFormat::S32Le));
    }
}
