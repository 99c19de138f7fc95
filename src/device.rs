use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use std::{io, os::raw::c_void};

use log::warn;

use crate::capability::{self, Capabilities};
use crate::error::DeviceError;
use crate::format::Formats;
use crate::v4l2;

/// Raw access to an opened video device node
///
/// Everything above the ioctl layer (format negotiation, the buffer pool, the capture engine and
/// the controls) talks to the driver exclusively through this trait. [`Device`] implements it on
/// top of a real file descriptor.
///
/// Handles are shared between the buffer pool, the capture engine and the controls, so a camera
/// can be moved to a capture thread as a whole.
pub trait Handle: Send + Sync {
    /// Issues an ioctl
    ///
    /// # Safety
    ///
    /// `argp` must point to a live value of the struct type whose size is encoded in `request`.
    unsafe fn ioctl(&self, request: u32, argp: *mut c_void) -> io::Result<()>;

    /// Maps `length` bytes of driver memory starting at `offset` into the process
    ///
    /// # Safety
    ///
    /// The region must be released with [`Handle::munmap`] exactly once.
    unsafe fn mmap(&self, length: usize, offset: u32) -> io::Result<*mut u8>;

    /// Releases a region returned by [`Handle::mmap`]
    ///
    /// # Safety
    ///
    /// `start` and `length` must describe a live mapping of this handle.
    unsafe fn munmap(&self, start: *mut u8, length: usize) -> io::Result<()>;

    /// Waits until a frame can be dequeued without blocking
    ///
    /// Returns `false` when the timeout expired first. `None` waits forever.
    fn poll(&self, timeout: Option<Duration>) -> io::Result<bool>;

    /// Closes the node
    ///
    /// Later calls do nothing. No other method may be called afterwards.
    fn close(&self) -> io::Result<()>;
}

/// Linux capture device abstraction
///
/// Owns the file descriptor of a `/dev/videoN` node. The descriptor is closed on drop.
pub struct Device {
    /// raw OS file descriptor
    fd: std::os::raw::c_int,
    /// device node path
    path: PathBuf,
    /// capabilities reported when the node was opened
    caps: Capabilities,
    /// set once the fd has been closed
    closed: AtomicBool,
}

impl Device {
    /// Returns a capture device by index
    ///
    /// Devices are usually enumerated by the system.
    /// An index of zero thus represents the first device the system got to know about.
    ///
    /// The node is rejected unless it supports video capture through streaming I/O.
    ///
    /// # Arguments
    ///
    /// * `index` - Index (0: first, 1: second, ..)
    ///
    /// # Example
    ///
    /// ```
    /// use webcam::Device;
    /// let dev = Device::open(0);
    /// ```
    pub fn open(index: usize) -> Result<Self, DeviceError> {
        Self::with_path(format!("{}{}", "/dev/video", index))
    }

    /// Returns a capture device by path
    ///
    /// # Arguments
    ///
    /// * `path` - Path (e.g. "/dev/video0")
    pub fn with_path<P: AsRef<Path>>(path: P) -> Result<Self, DeviceError> {
        let path = path.as_ref();
        let fd = v4l2::open(path, libc::O_RDWR)?;

        // Own the fd before anything else can fail so it is closed on every path.
        let mut dev = Device {
            fd,
            path: PathBuf::from(path),
            caps: Capabilities {
                driver: String::new(),
                card: String::new(),
                bus: String::new(),
                version: (0, 0, 0),
                flags: capability::Flags::empty(),
            },
            closed: AtomicBool::new(false),
        };
        dev.caps = capability::verify(&dev)?;

        Ok(dev)
    }

    /// Returns the raw fd of the device
    pub fn fd(&self) -> std::os::raw::c_int {
        self.fd
    }

    /// Returns the device node path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Capabilities reported by the driver when the node was opened
    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    /// Returns the pixelformats the device can capture, in driver order
    pub fn enum_formats(&self) -> Formats<'_> {
        Formats::new(self)
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("failed to close {}: {}", self.path.display(), e);
        }
    }
}

impl Handle for Device {
    unsafe fn ioctl(&self, request: u32, argp: *mut c_void) -> io::Result<()> {
        v4l2::ioctl(self.fd, request, argp)
    }

    unsafe fn mmap(&self, length: usize, offset: u32) -> io::Result<*mut u8> {
        v4l2::mmap(length, self.fd, offset as libc::off_t).map(|ptr| ptr as *mut u8)
    }

    unsafe fn munmap(&self, start: *mut u8, length: usize) -> io::Result<()> {
        v4l2::munmap(start as *mut c_void, length)
    }

    fn poll(&self, timeout: Option<Duration>) -> io::Result<bool> {
        v4l2::poll(self.fd, timeout)
    }

    fn close(&self) -> io::Result<()> {
        // close(2) must not be retried, not even on EINTR
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        v4l2::close(self.fd)
    }
}
