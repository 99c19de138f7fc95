use crate::v4l2::videodev::*;

// linux ioctl.h
pub const _IOC_NRBITS: u32 = 8;
pub const _IOC_TYPEBITS: u32 = 8;
pub const _IOC_SIZEBITS: u32 = 14;
pub const _IOC_DIRBITS: u32 = 2;

pub const _IOC_NRSHIFT: u32 = 0;
pub const _IOC_TYPESHIFT: u32 = _IOC_NRSHIFT + _IOC_NRBITS;
pub const _IOC_SIZESHIFT: u32 = _IOC_TYPESHIFT + _IOC_TYPEBITS;
pub const _IOC_DIRSHIFT: u32 = _IOC_SIZESHIFT + _IOC_SIZEBITS;

/// Data transfer direction of an ioctl, seen from userspace
#[allow(clippy::unreadable_literal)]
#[rustfmt::skip]
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Direction {
    None        = 0,
    Write       = 1,
    Read        = 2,
    ReadWrite   = 3,
}

/// Computes an ioctl request code the way the kernel `_IOC` macro does
///
/// Every field is masked to its bit-width, so oversized arguments cannot bleed into the
/// neighbouring fields.
///
/// # Arguments
///
/// * `dir` - Transfer direction
/// * `typ` - Type character, `b'V'` for video4linux
/// * `nr` - Item number
/// * `size` - Size of the argument struct in bytes
///
/// # Example
///
/// ```
/// use webcam::v4l2::vidioc::{encode, Direction};
/// let querycap = encode(Direction::Read, b'V', 0, 104);
/// assert_eq!(querycap, 0x8068_5600);
/// ```
pub const fn encode(dir: Direction, typ: u8, nr: u8, size: usize) -> u32 {
    let size = size as u32 & ((1 << _IOC_SIZEBITS) - 1);

    ((dir as u32) << _IOC_DIRSHIFT)
        | ((typ as u32) << _IOC_TYPESHIFT)
        | ((nr as u32) << _IOC_NRSHIFT)
        | (size << _IOC_SIZESHIFT)
}

/// Splits a request code back into its (direction, type, number, size) fields
pub const fn decode(request: u32) -> (u32, u8, u8, usize) {
    (
        (request >> _IOC_DIRSHIFT) & ((1 << _IOC_DIRBITS) - 1),
        ((request >> _IOC_TYPESHIFT) & ((1 << _IOC_TYPEBITS) - 1)) as u8,
        ((request >> _IOC_NRSHIFT) & ((1 << _IOC_NRBITS) - 1)) as u8,
        ((request >> _IOC_SIZESHIFT) & ((1 << _IOC_SIZEBITS) - 1)) as usize,
    )
}

macro_rules! _IOR {
    ($type:expr, $nr:expr, $size:ty) => {
        encode(Direction::Read, $type, $nr, std::mem::size_of::<$size>())
    };
}

macro_rules! _IOW {
    ($type:expr, $nr:expr, $size:ty) => {
        encode(Direction::Write, $type, $nr, std::mem::size_of::<$size>())
    };
}

macro_rules! _IOWR {
    ($type:expr, $nr:expr, $size:ty) => {
        encode(Direction::ReadWrite, $type, $nr, std::mem::size_of::<$size>())
    };
}

pub const VIDIOC_QUERYCAP: u32 = _IOR!(b'V', 0, v4l2_capability);
pub const VIDIOC_ENUM_FMT: u32 = _IOWR!(b'V', 2, v4l2_fmtdesc);
pub const VIDIOC_G_FMT: u32 = _IOWR!(b'V', 4, v4l2_format);
pub const VIDIOC_S_FMT: u32 = _IOWR!(b'V', 5, v4l2_format);
pub const VIDIOC_REQBUFS: u32 = _IOWR!(b'V', 8, v4l2_requestbuffers);
pub const VIDIOC_QUERYBUF: u32 = _IOWR!(b'V', 9, v4l2_buffer);
pub const VIDIOC_QBUF: u32 = _IOWR!(b'V', 15, v4l2_buffer);
pub const VIDIOC_DQBUF: u32 = _IOWR!(b'V', 17, v4l2_buffer);
pub const VIDIOC_STREAMON: u32 = _IOW!(b'V', 18, std::os::raw::c_int);
pub const VIDIOC_STREAMOFF: u32 = _IOW!(b'V', 19, std::os::raw::c_int);
pub const VIDIOC_G_CTRL: u32 = _IOWR!(b'V', 27, v4l2_control);
pub const VIDIOC_S_CTRL: u32 = _IOWR!(b'V', 28, v4l2_control);
pub const VIDIOC_QUERYCTRL: u32 = _IOWR!(b'V', 36, v4l2_queryctrl);
