use std::iter::FusedIterator;
use std::{fmt, io, mem};

use log::{debug, warn};

use crate::capability::string_from_cstr;
use crate::device::Handle;
use crate::error::DeviceError;
use crate::fourcc::{self, FourCC};
use crate::v4l2::videodev::*;
use crate::v4l2::vidioc;

/// Pixel layout families the capture path knows how to hand out
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Family {
    /// Motion-JPEG, every frame is a complete JPEG image
    Mjpeg,
    Rgba,
    Rgb,
}

impl Family {
    /// Classifies a pixelformat code
    pub fn of(code: u32) -> Option<Self> {
        if code == fourcc::V4L2_PIX_FMT_MJPEG {
            Some(Family::Mjpeg)
        } else if fourcc::RGBA_FORMATS.contains(&code) {
            Some(Family::Rgba)
        } else if fourcc::RGB_FORMATS.contains(&code) {
            Some(Family::Rgb)
        } else {
            None
        }
    }

    /// Short tag ("MJPEG", "RGBA", "RGB")
    pub fn tag(&self) -> &'static str {
        match self {
            Family::Mjpeg => "MJPEG",
            Family::Rgba => "RGBA",
            Family::Rgb => "RGB",
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

bitflags::bitflags! {
    #[derive(PartialEq, Eq, Hash, Debug, Clone, Copy)]
    pub struct Flags : u32 {
        const COMPRESSED            = 0x0001;
        const EMULATED              = 0x0002;
        const CONTINUOUS_BITSTREAM  = 0x0004;
        const DYN_RESOLUTION        = 0x0008;
    }
}

impl From<u32> for Flags {
    fn from(flags: u32) -> Self {
        Self::from_bits_retain(flags)
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Format description as returned by [`crate::v4l2::vidioc::VIDIOC_ENUM_FMT`]
pub struct Description {
    pub index: u32,
    pub flags: Flags,
    pub description: String,
    pub fourcc: FourCC,
}

impl Description {
    /// Family of the described pixelformat, if it is one the capture path supports
    pub fn family(&self) -> Option<Family> {
        Family::of(self.fourcc.into())
    }
}

impl fmt::Display for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "index       : {}", self.index)?;
        writeln!(f, "flags:      : {}", self.flags)?;
        writeln!(f, "description : {}", self.description)?;
        writeln!(f, "fourcc      : {}", self.fourcc)?;
        Ok(())
    }
}

impl From<v4l2_fmtdesc> for Description {
    fn from(desc: v4l2_fmtdesc) -> Self {
        Self {
            index: desc.index,
            flags: Flags::from(desc.flags),
            description: string_from_cstr(&desc.description),
            fourcc: FourCC::from(desc.pixelformat),
        }
    }
}

/// Lazy enumeration of the formats a device supports
///
/// Each step issues one `VIDIOC_ENUM_FMT` with the next index. The first failing ioctl ends the
/// sequence: drivers signal the end of the list with EINVAL, and any other error is treated the
/// same way. Once finished, the iterator keeps returning `None`.
pub struct Formats<'a> {
    handle: &'a dyn Handle,
    raw: v4l2_fmtdesc,
    done: bool,
}

impl<'a> Formats<'a> {
    pub fn new(handle: &'a dyn Handle) -> Self {
        Formats {
            handle,
            raw: v4l2_fmtdesc {
                index: 0,
                type_: V4L2_BUF_TYPE_VIDEO_CAPTURE,
                ..unsafe { mem::zeroed() }
            },
            done: false,
        }
    }
}

impl Iterator for Formats<'_> {
    type Item = Description;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let ret = unsafe {
            self.handle.ioctl(
                vidioc::VIDIOC_ENUM_FMT,
                &mut self.raw as *mut _ as *mut std::os::raw::c_void,
            )
        };
        if let Err(e) = ret {
            debug!("format enumeration ended at index {}: {}", self.raw.index, e);
            self.done = true;
            return None;
        }

        let desc = Description::from(self.raw);
        debug!("format {}: {} ({})", desc.index, desc.fourcc, desc.description);

        self.raw.index += 1;
        self.raw.description = [0; 32];
        Some(desc)
    }
}

impl FusedIterator for Formats<'_> {}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
/// Streaming format (single-planar)
pub struct Format {
    /// width in pixels
    pub width: u32,
    /// height in pixels
    pub height: u32,
    /// pixelformat code
    pub fourcc: FourCC,
    /// bytes per line
    pub stride: u32,
    /// maximum number of bytes required to store an image
    pub size: u32,
}

impl Format {
    /// Returns a capture format
    ///
    /// # Example
    ///
    /// ```
    /// use webcam::{Format, FourCC};
    /// let fmt = Format::new(640, 480, FourCC::new(b"MJPG"));
    /// ```
    pub const fn new(width: u32, height: u32, fourcc: FourCC) -> Self {
        Format {
            width,
            height,
            fourcc,
            stride: 0,
            size: 0,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "width          : {}", self.width)?;
        writeln!(f, "height         : {}", self.height)?;
        writeln!(f, "fourcc         : {}", self.fourcc)?;
        writeln!(f, "stride         : {}", self.stride)?;
        writeln!(f, "size           : {}", self.size)?;
        Ok(())
    }
}

impl From<v4l2_pix_format> for Format {
    fn from(fmt: v4l2_pix_format) -> Self {
        Self {
            width: fmt.width,
            height: fmt.height,
            fourcc: FourCC::from(fmt.pixelformat),
            stride: fmt.bytesperline,
            size: fmt.sizeimage,
        }
    }
}

impl From<Format> for v4l2_pix_format {
    fn from(format: Format) -> Self {
        Self {
            width: format.width,
            height: format.height,
            pixelformat: format.fourcc.into(),
            field: V4L2_FIELD_ANY,
            bytesperline: format.stride,
            sizeimage: format.size,
            ..unsafe { mem::zeroed() }
        }
    }
}

/// Picks the pixelformat to request from the ones a device supports
///
/// MJPEG wins whenever it is offered. Otherwise the first entry of [`fourcc::RGBA_FORMATS`]
/// the device supports is used, then the first of [`fourcc::RGB_FORMATS`]. The order of the
/// candidates themselves does not matter.
pub fn negotiate(candidates: &[Description]) -> Result<(FourCC, Family), DeviceError> {
    let supported = |code: u32| candidates.iter().any(|c| u32::from(c.fourcc) == code);

    let code = if supported(fourcc::V4L2_PIX_FMT_MJPEG) {
        fourcc::V4L2_PIX_FMT_MJPEG
    } else if let Some(code) = fourcc::RGBA_FORMATS.iter().find(|c| supported(**c)) {
        *code
    } else if let Some(code) = fourcc::RGB_FORMATS.iter().find(|c| supported(**c)) {
        *code
    } else {
        return Err(DeviceError::UnsupportedFormat);
    };

    // The preference lists and Family::of agree, so this cannot fail.
    let family = Family::of(code).ok_or(DeviceError::UnsupportedFormat)?;
    Ok((FourCC::from(code), family))
}

/// Submits a format with `VIDIOC_S_FMT`
///
/// Returns the format echoed back by the driver, which may have adjusted it.
pub fn apply(handle: &dyn Handle, fmt: &Format) -> io::Result<Format> {
    let mut v4l2_fmt = v4l2_format {
        type_: V4L2_BUF_TYPE_VIDEO_CAPTURE,
        fmt: v4l2_format_fmt { pix: (*fmt).into() },
    };
    unsafe {
        handle.ioctl(
            vidioc::VIDIOC_S_FMT,
            &mut v4l2_fmt as *mut _ as *mut std::os::raw::c_void,
        )?;

        Ok(Format::from(v4l2_fmt.fmt.pix))
    }
}

/// Outcome of format negotiation
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Negotiated {
    /// How the frame bytes are to be interpreted
    pub family: Family,
    /// The format as adjusted by the driver
    pub format: Format,
}

/// Enumerates the device formats, picks one and configures the device with it
///
/// The driver is authoritative over the final geometry: the returned width and height are the
/// ones the driver echoed, not the requested ones.
pub fn select(handle: &dyn Handle, width: u32, height: u32) -> Result<Negotiated, DeviceError> {
    let candidates: Vec<Description> = Formats::new(handle).collect();
    let (fourcc, family) = negotiate(&candidates)?;
    debug!("requesting {} ({}) at {}x{}", fourcc, family, width, height);

    let format = apply(handle, &Format::new(width, height, fourcc))?;
    if format.width != width || format.height != height {
        debug!(
            "driver adjusted {}x{} to {}x{}",
            width, height, format.width, format.height
        );
    }

    let family = if format.fourcc == fourcc {
        family
    } else {
        warn!("driver replaced {} with {}", fourcc, format.fourcc);
        Family::of(format.fourcc.into()).ok_or(DeviceError::UnsupportedFormat)?
    };

    Ok(Negotiated { family, format })
}
