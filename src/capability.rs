use std::{fmt, io, mem};

use log::info;

use crate::device::Handle;
use crate::error::DeviceError;
use crate::v4l2::videodev::*;
use crate::v4l2::vidioc;

bitflags::bitflags! {
    /// Device capability flags
    #[derive(PartialEq, Eq, Hash, Debug, Clone, Copy)]
    pub struct Flags: u32 {
        const VIDEO_CAPTURE         = 0x00000001;
        const VIDEO_OUTPUT          = 0x00000002;
        const VIDEO_OVERLAY         = 0x00000004;
        const VBI_CAPTURE           = 0x00000010;
        const VBI_OUTPUT            = 0x00000020;
        const VIDEO_CAPTURE_MPLANE  = 0x00001000;
        const VIDEO_OUTPUT_MPLANE   = 0x00002000;
        const VIDEO_M2M_MPLANE      = 0x00004000;
        const VIDEO_M2M             = 0x00008000;
        const TUNER                 = 0x00010000;
        const AUDIO                 = 0x00020000;
        const RADIO                 = 0x00040000;
        const SDR_CAPTURE           = 0x00100000;
        const EXT_PIX_FORMAT        = 0x00200000;
        const META_CAPTURE          = 0x00800000;
        const READ_WRITE            = 0x01000000;
        const STREAMING             = 0x04000000;
        const META_OUTPUT           = 0x08000000;
        const TOUCH                 = 0x10000000;
        const DEVICE_CAPS           = 0x80000000;
    }
}

impl From<u32> for Flags {
    fn from(flags: u32) -> Self {
        Self::from_bits_retain(flags)
    }
}

impl From<Flags> for u32 {
    fn from(flags: Flags) -> Self {
        flags.bits()
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone)]
/// Device capabilities
pub struct Capabilities {
    /// Driver name, e.g. uvc for usb video class devices
    pub driver: String,
    /// Card name
    pub card: String,
    /// Bus name, e.g. USB or PCI
    pub bus: String,
    /// Version number MAJOR.MINOR.PATCH
    pub version: (u8, u8, u8),

    /// Capabilities of the opened node
    ///
    /// Taken from `device_caps` when the driver fills it in, otherwise from the
    /// capabilities of the physical device.
    pub flags: Flags,
}

impl Capabilities {
    /// Checks that the node can stream video frames
    pub fn verify(&self) -> Result<(), DeviceError> {
        if !self.flags.contains(Flags::VIDEO_CAPTURE) {
            return Err(DeviceError::NotCapturable);
        }
        if !self.flags.contains(Flags::STREAMING) {
            return Err(DeviceError::NoStreaming);
        }
        Ok(())
    }
}

/// Reads a nul-padded C string out of a fixed size array
pub(crate) fn string_from_cstr(raw: &[u8]) -> String {
    let len = raw.iter().position(|c| *c == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..len]).into_owned()
}

impl From<v4l2_capability> for Capabilities {
    fn from(cap: v4l2_capability) -> Self {
        let flags = if cap.capabilities & V4L2_CAP_DEVICE_CAPS != 0 {
            cap.device_caps
        } else {
            cap.capabilities
        };

        Capabilities {
            driver: string_from_cstr(&cap.driver),
            card: string_from_cstr(&cap.card),
            bus: string_from_cstr(&cap.bus_info),
            version: (
                ((cap.version >> 16) & 0xff) as u8,
                ((cap.version >> 8) & 0xff) as u8,
                (cap.version & 0xff) as u8,
            ),
            flags: Flags::from(flags),
        }
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Driver      : {}", self.driver)?;
        writeln!(f, "Card        : {}", self.card)?;
        writeln!(f, "Bus         : {}", self.bus)?;
        writeln!(
            f,
            "Version     : {}.{}.{}",
            self.version.0, self.version.1, self.version.2
        )?;
        writeln!(f, "Capabilites : {}", self.flags)?;
        Ok(())
    }
}

/// Query for device capabilities
///
/// This returns video4linux framework defined information such as card, driver, etc.
pub fn query(handle: &dyn Handle) -> io::Result<Capabilities> {
    let mut v4l2_caps: v4l2_capability = unsafe { mem::zeroed() };
    unsafe {
        handle.ioctl(
            vidioc::VIDIOC_QUERYCAP,
            &mut v4l2_caps as *mut _ as *mut std::os::raw::c_void,
        )?;
    }

    Ok(Capabilities::from(v4l2_caps))
}

/// Queries the capabilities and rejects nodes that cannot stream video frames
pub fn verify(handle: &dyn Handle) -> Result<Capabilities, DeviceError> {
    let caps = query(handle)?;
    caps.verify()?;

    info!(
        "{} ({}) on {}, driver version {}.{}.{}",
        caps.card, caps.driver, caps.bus, caps.version.0, caps.version.1, caps.version.2
    );
    Ok(caps)
}
