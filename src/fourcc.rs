use std::{fmt, str};

/// Flag marking the big-endian variant of a pixelformat
pub const BIG_ENDIAN: u32 = 1 << 31;

/// Packs four characters into a little-endian pixelformat code
pub const fn pack(a: u8, b: u8, c: u8, d: u8) -> u32 {
    (a as u32) | ((b as u32) << 8) | ((c as u32) << 16) | ((d as u32) << 24)
}

/// Same as [`pack`], with the big-endian flag set
pub const fn pack_be(a: u8, b: u8, c: u8, d: u8) -> u32 {
    pack(a, b, c, d) | BIG_ENDIAN
}

/// Splits a pixelformat code back into its four characters
///
/// The big-endian flag is part of the last byte, so it survives the round trip.
pub const fn unpack(code: u32) -> (u8, u8, u8, u8) {
    (
        (code & 0xff) as u8,
        ((code >> 8) & 0xff) as u8,
        ((code >> 16) & 0xff) as u8,
        ((code >> 24) & 0xff) as u8,
    )
}

pub const V4L2_PIX_FMT_MJPEG: u32 = pack(b'M', b'J', b'P', b'G');
pub const V4L2_PIX_FMT_JPEG: u32 = pack(b'J', b'P', b'E', b'G');
pub const V4L2_PIX_FMT_YUYV: u32 = pack(b'Y', b'U', b'Y', b'V');
pub const V4L2_PIX_FMT_GREY: u32 = pack(b'G', b'R', b'E', b'Y');

pub const V4L2_PIX_FMT_RGB332: u32 = pack(b'R', b'G', b'B', b'1');
pub const V4L2_PIX_FMT_RGB444: u32 = pack(b'R', b'4', b'4', b'4');
pub const V4L2_PIX_FMT_RGB555: u32 = pack(b'R', b'G', b'B', b'O');
pub const V4L2_PIX_FMT_RGB555X: u32 = pack(b'R', b'G', b'B', b'Q');
pub const V4L2_PIX_FMT_RGB565: u32 = pack(b'R', b'G', b'B', b'P');
pub const V4L2_PIX_FMT_RGB565X: u32 = pack(b'R', b'G', b'B', b'R');
pub const V4L2_PIX_FMT_RGB24: u32 = pack(b'R', b'G', b'B', b'3');
pub const V4L2_PIX_FMT_BGR24: u32 = pack(b'B', b'G', b'R', b'3');
pub const V4L2_PIX_FMT_RGB32: u32 = pack(b'R', b'G', b'B', b'4');

pub const V4L2_PIX_FMT_RGBA444: u32 = pack(b'R', b'A', b'1', b'2');
pub const V4L2_PIX_FMT_RGBA555: u32 = pack(b'R', b'A', b'1', b'5');
pub const V4L2_PIX_FMT_RGBA32: u32 = pack(b'A', b'B', b'2', b'4');
pub const V4L2_PIX_FMT_ARGB555X: u32 = pack_be(b'A', b'R', b'1', b'5');

/// RGB formats in order of preference
pub const RGB_FORMATS: [u32; 8] = [
    V4L2_PIX_FMT_RGB332,
    V4L2_PIX_FMT_RGB444,
    V4L2_PIX_FMT_RGB555,
    V4L2_PIX_FMT_RGB555X,
    V4L2_PIX_FMT_RGB565,
    V4L2_PIX_FMT_RGB565X,
    V4L2_PIX_FMT_RGB24,
    V4L2_PIX_FMT_RGB32,
];

/// RGBA formats in order of preference
pub const RGBA_FORMATS: [u32; 3] = [
    V4L2_PIX_FMT_RGBA444,
    V4L2_PIX_FMT_RGBA555,
    V4L2_PIX_FMT_RGBA32,
];

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
/// Four character code representing a pixelformat
pub struct FourCC {
    pub repr: [u8; 4],
}

impl FourCC {
    pub const MJPEG: FourCC = FourCC::new(b"MJPG");

    #[allow(clippy::trivially_copy_pass_by_ref)]
    /// Returns a pixelformat as four character code
    ///
    /// # Arguments
    ///
    /// * `repr` - Four characters as raw bytes
    ///
    /// # Example
    ///
    /// ```
    /// use webcam::FourCC;
    /// let fourcc = FourCC::new(b"YUYV");
    /// ```
    pub const fn new(repr: &[u8; 4]) -> FourCC {
        FourCC { repr: *repr }
    }

    /// Whether the big-endian flag is set
    pub fn is_big_endian(&self) -> bool {
        u32::from(*self) & BIG_ENDIAN != 0
    }

    /// Returns the string representation of a four character code
    ///
    /// Fails for big-endian variants, whose last byte carries the flag bit.
    pub fn str(&self) -> Result<&str, str::Utf8Error> {
        str::from_utf8(&self.repr)
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (a, b, c, d) = unpack(u32::from(*self) & !BIG_ENDIAN);
        for ch in [a, b, c, d].iter() {
            write!(f, "{}", char::from(*ch))?;
        }
        if self.is_big_endian() {
            write!(f, "-BE")?;
        }
        Ok(())
    }
}

impl From<u32> for FourCC {
    fn from(code: u32) -> Self {
        FourCC::new(&code.to_le_bytes())
    }
}

impl From<FourCC> for u32 {
    fn from(fourcc: FourCC) -> Self {
        Self::from_le_bytes(fourcc.repr)
    }
}
