//! PCM sample formats.

/// A PCM sample format: storage width, signedness and endianness for the
/// linear encodings, or one of the companded codings.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    /// Signed 8 bit.
    S8 = 0,
    /// Unsigned 8 bit.
    U8,
    /// Signed 16 bit, little endian.
    S16Le,
    /// Signed 16 bit, big endian.
    S16Be,
    /// Unsigned 16 bit, little endian.
    U16Le,
    /// Unsigned 16 bit, big endian.
    U16Be,
    /// Signed 24 bit in the low three bytes of a 32-bit word, little endian.
    S24Le,
    /// Signed 24 bit in the low three bytes of a 32-bit word, big endian.
    S24Be,
    /// Unsigned 24 bit, little endian.
    U24Le,
    /// Unsigned 24 bit, big endian.
    U24Be,
    /// Signed 32 bit, little endian.
    S32Le,
    /// Signed 32 bit, big endian.
    S32Be,
    /// Unsigned 32 bit, little endian.
    U32Le,
    /// Unsigned 32 bit, big endian.
    U32Be,
    /// 32-bit float in -1.0..1.0, little endian.
    FloatLe,
    /// 32-bit float in -1.0..1.0, big endian.
    FloatBe,
    /// Mu-Law companded.
    MuLaw,
    /// A-Law companded.
    ALaw,
    /// IMA ADPCM compressed.
    ImaAdpcm,
}

impl SampleFormat {
    /// Every format, in discriminant order.
    pub const ALL: [SampleFormat; 19] = [
        SampleFormat::S8,
        SampleFormat::U8,
        SampleFormat::S16Le,
        SampleFormat::S16Be,
        SampleFormat::U16Le,
        SampleFormat::U16Be,
        SampleFormat::S24Le,
        SampleFormat::S24Be,
        SampleFormat::U24Le,
        SampleFormat::U24Be,
        SampleFormat::S32Le,
        SampleFormat::S32Be,
        SampleFormat::U32Le,
        SampleFormat::U32Be,
        SampleFormat::FloatLe,
        SampleFormat::FloatBe,
        SampleFormat::MuLaw,
        SampleFormat::ALaw,
        SampleFormat::ImaAdpcm,
    ];

    /// Signed 16 bit in the byte order of this host.
    pub const S16_NATIVE: SampleFormat = if cfg!(target_endian = "big") {
        SampleFormat::S16Be
    } else {
        SampleFormat::S16Le
    };

    /// Nominal sample width in bits.
    #[inline]
    pub const fn width(&self) -> u32 {
        match self {
            SampleFormat::S8 | SampleFormat::U8 => 8,
            SampleFormat::S16Le | SampleFormat::S16Be | SampleFormat::U16Le | SampleFormat::U16Be => 16,
            SampleFormat::S24Le | SampleFormat::S24Be | SampleFormat::U24Le | SampleFormat::U24Be => 24,
            SampleFormat::S32Le | SampleFormat::S32Be | SampleFormat::U32Le | SampleFormat::U32Be => 32,
            SampleFormat::FloatLe | SampleFormat::FloatBe => 32,
            SampleFormat::MuLaw | SampleFormat::ALaw => 8,
            SampleFormat::ImaAdpcm => 4,
        }
    }

    /// Returns `true` for the integer PCM encodings.
    ///
    /// Floats are plug-convertible but do not count as linear: the rate
    /// converter and the piggyback format changes operate on integer
    /// samples only.
    #[inline]
    pub const fn is_linear(&self) -> bool {
        matches!(
            self,
            SampleFormat::S8
                | SampleFormat::U8
                | SampleFormat::S16Le
                | SampleFormat::S16Be
                | SampleFormat::U16Le
                | SampleFormat::U16Be
                | SampleFormat::S24Le
                | SampleFormat::S24Be
                | SampleFormat::U24Le
                | SampleFormat::U24Be
                | SampleFormat::S32Le
                | SampleFormat::S32Be
                | SampleFormat::U32Le
                | SampleFormat::U32Be
        )
    }

    /// Returns `true` for the float encodings.
    #[inline]
    pub const fn is_float(&self) -> bool {
        matches!(self, SampleFormat::FloatLe | SampleFormat::FloatBe)
    }

    /// Returns `true` for the companded/compressed encodings.
    #[inline]
    pub const fn is_companded(&self) -> bool {
        matches!(self, SampleFormat::MuLaw | SampleFormat::ALaw | SampleFormat::ImaAdpcm)
    }

    /// Returns `true` for unsigned integer encodings.
    #[inline]
    pub const fn is_unsigned(&self) -> bool {
        matches!(
            self,
            SampleFormat::U8
                | SampleFormat::U16Le
                | SampleFormat::U16Be
                | SampleFormat::U24Le
                | SampleFormat::U24Be
                | SampleFormat::U32Le
                | SampleFormat::U32Be
        )
    }

    /// Returns `true` for big-endian encodings. Single-byte and companded
    /// formats have no byte order and report `false`.
    #[inline]
    pub const fn is_big_endian(&self) -> bool {
        matches!(
            self,
            SampleFormat::S16Be
                | SampleFormat::U16Be
                | SampleFormat::S24Be
                | SampleFormat::U24Be
                | SampleFormat::S32Be
                | SampleFormat::U32Be
                | SampleFormat::FloatBe
        )
    }

    /// Assemble the linear integer format with the given width, signedness
    /// and endianness. Returns `None` when no such encoding exists.
    pub const fn build_linear(width: u32, unsigned: bool, big_endian: bool) -> Option<SampleFormat> {
        match (width, unsigned, big_endian) {
            (8, false, _) => Some(SampleFormat::S8),
            (8, true, _) => Some(SampleFormat::U8),
            (16, false, false) => Some(SampleFormat::S16Le),
            (16, false, true) => Some(SampleFormat::S16Be),
            (16, true, false) => Some(SampleFormat::U16Le),
            (16, true, true) => Some(SampleFormat::U16Be),
            (24, false, false) => Some(SampleFormat::S24Le),
            (24, false, true) => Some(SampleFormat::S24Be),
            (24, true, false) => Some(SampleFormat::U24Le),
            (24, true, true) => Some(SampleFormat::U24Be),
            (32, false, false) => Some(SampleFormat::S32Le),
            (32, false, true) => Some(SampleFormat::S32Be),
            (32, true, false) => Some(SampleFormat::U32Le),
            (32, true, true) => Some(SampleFormat::U32Be),
            _ => None,
        }
    }

    #[inline]
    pub(crate) const fn bit(self) -> u32 {
        1 << self as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widths() {
        assert_eq!(SampleFormat::S8.width(), 8);
        assert_eq!(SampleFormat::U16Be.width(), 16);
        assert_eq!(SampleFormat::S24Le.width(), 24);
        assert_eq!(SampleFormat::FloatLe.width(), 32);
        assert_eq!(SampleFormat::ImaAdpcm.width(), 4);
    }

    #[test]
    fn test_linearity_split() {
        assert!(SampleFormat::S16Le.is_linear());
        assert!(SampleFormat::U32Be.is_linear());
        assert!(!SampleFormat::FloatLe.is_linear());
        assert!(SampleFormat::FloatLe.is_float());
        assert!(!SampleFormat::MuLaw.is_linear());
        assert!(SampleFormat::MuLaw.is_companded());
    }

    #[test]
    fn test_build_linear_round_trip() {
        for format in SampleFormat::ALL {
            if !format.is_linear() {
                continue;
            }
            let rebuilt =
                SampleFormat::build_linear(format.width(), format.is_unsigned(), format.is_big_endian());
            // S8/U8 ignore endianness, so compare through the predicates.
            let rebuilt = rebuilt.expect("linear formats must be assemblable");
            assert_eq!(rebuilt.width(), format.width());
            assert_eq!(rebuilt.is_unsigned(), format.is_unsigned());
        }
    }

    #[test]
    fn test_build_linear_rejects_odd_widths() {
        assert_eq!(SampleFormat::build_linear(0, false, false), None);
        assert_eq!(SampleFormat::build_linear(12, false, false), None);
        assert_eq!(SampleFormat::build_linear(64, true, true), None);
    }
}
