use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use std::{fmt, fs};

use log::info;

use crate::capability::{self, Capabilities};
use crate::config::Config;
use crate::control::Controls;
use crate::device::{Device, Handle};
use crate::error::{DeviceError, Result};
use crate::format::{self, Family, Format, Negotiated};
use crate::stream::{State, Stream};

/// One captured frame, tagged with how its bytes are laid out
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A complete JPEG image
    Mjpeg(Vec<u8>),
    /// Packed RGB pixels in the negotiated pixelformat
    Rgb {
        width: u32,
        height: u32,
        data: Vec<u8>,
    },
    /// Packed RGB pixels with alpha in the negotiated pixelformat
    Rgba {
        width: u32,
        height: u32,
        data: Vec<u8>,
    },
}

impl Frame {
    pub fn family(&self) -> Family {
        match self {
            Frame::Mjpeg(_) => Family::Mjpeg,
            Frame::Rgb { .. } => Family::Rgb,
            Frame::Rgba { .. } => Family::Rgba,
        }
    }

    pub fn data(&self) -> &[u8] {
        match self {
            Frame::Mjpeg(data) | Frame::Rgb { data, .. } | Frame::Rgba { data, .. } => data,
        }
    }

    pub fn into_data(self) -> Vec<u8> {
        match self {
            Frame::Mjpeg(data) | Frame::Rgb { data, .. } | Frame::Rgba { data, .. } => data,
        }
    }
}

/// Webcam opened for mmap streaming
///
/// Bringing a camera up verifies the device capabilities, negotiates a pixelformat, maps the
/// buffers and prepares the image controls. Frames are captured as owned byte vectors.
///
/// Dropping the camera stops streaming, unmaps and frees the buffers and finally closes the
/// device, in that order.
pub struct Camera {
    // Field order is teardown order.
    stream: Stream,
    controls: Controls,
    negotiated: Negotiated,
    caps: Capabilities,
    handle: Arc<dyn Handle>,
}

impl Camera {
    /// Opens `/dev/video{index}` with the default settings
    ///
    /// # Example
    ///
    /// ```no_run
    /// use webcam::Camera;
    /// let mut cam = Camera::new(0).unwrap();
    /// let jpeg = cam.capture().unwrap();
    /// ```
    pub fn new(index: usize) -> std::result::Result<Self, DeviceError> {
        Camera::with_config(&Config::new(index))
    }

    pub fn with_config(config: &Config) -> std::result::Result<Self, DeviceError> {
        let dev = Device::open(config.index)?;
        let caps = dev.capabilities().clone();
        Camera::assemble(Arc::new(dev), caps, config)
    }

    /// Brings a camera up on an already opened device
    ///
    /// `config.index` is ignored.
    pub fn from_handle(
        handle: Arc<dyn Handle>,
        config: &Config,
    ) -> std::result::Result<Self, DeviceError> {
        let caps = capability::verify(handle.as_ref())?;
        Camera::assemble(handle, caps, config)
    }

    fn assemble(
        handle: Arc<dyn Handle>,
        caps: Capabilities,
        config: &Config,
    ) -> std::result::Result<Self, DeviceError> {
        let negotiated = format::select(handle.as_ref(), config.width, config.height)?;
        let stream = Stream::with_buffers(Arc::clone(&handle), config.buffers)?;
        let controls = Controls::new(Arc::clone(&handle));

        info!(
            "{}: {} {}x{} with {} buffers",
            caps.card,
            negotiated.family,
            negotiated.format.width,
            negotiated.format.height,
            stream.pool().len()
        );

        Ok(Camera {
            stream,
            controls,
            negotiated,
            caps,
            handle,
        })
    }

    /// Starts streaming, does nothing if the camera is already streaming
    pub fn open(&mut self) -> std::result::Result<(), DeviceError> {
        self.stream.start()
    }

    /// Stops streaming, does nothing if the camera is not streaming
    pub fn close(&mut self) -> std::result::Result<(), DeviceError> {
        self.stream.stop()
    }

    pub fn is_open(&self) -> bool {
        self.stream.state() == State::Streaming
    }

    /// Captures one frame as raw bytes
    ///
    /// Opens the camera first if needed. Blocks until the driver delivers a frame, see
    /// [`Camera::wait`] for a bounded wait.
    pub fn capture(&mut self) -> std::result::Result<Vec<u8>, DeviceError> {
        self.stream.capture()
    }

    /// Captures one frame tagged with its layout
    pub fn capture_frame(&mut self) -> std::result::Result<Frame, DeviceError> {
        let data = self.capture()?;
        let (width, height) = self.size();

        Ok(match self.negotiated.family {
            Family::Mjpeg => Frame::Mjpeg(data),
            Family::Rgb => Frame::Rgb {
                width,
                height,
                data,
            },
            Family::Rgba => Frame::Rgba {
                width,
                height,
                data,
            },
        })
    }

    /// Captures one frame and writes its raw bytes to `path`
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let data = self.capture()?;
        fs::write(path, data)?;
        Ok(())
    }

    /// Waits until a frame is ready, opening the camera first if needed
    ///
    /// Returns `false` if the timeout expired. `None` waits forever.
    pub fn wait(&mut self, timeout: Option<Duration>) -> Result<bool> {
        self.open()?;
        Ok(self.handle.poll(timeout)?)
    }

    /// Stops streaming, releases the buffers and closes the device, reporting the first failure
    ///
    /// The device is not closed if releasing the buffers failed. Dropping the camera then closes
    /// it and only logs errors.
    pub fn shutdown(mut self) -> std::result::Result<(), DeviceError> {
        self.stream.release()?;
        self.handle.close()?;
        Ok(())
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    /// The format the driver accepted
    pub fn format(&self) -> &Format {
        &self.negotiated.format
    }

    pub fn family(&self) -> Family {
        self.negotiated.family
    }

    /// Frame width and height as set by the driver
    pub fn size(&self) -> (u32, u32) {
        (self.negotiated.format.width, self.negotiated.format.height)
    }

    /// Number of mapped buffers
    pub fn buffers(&self) -> usize {
        self.stream.pool().len()
    }

    pub fn controls(&self) -> &Controls {
        &self.controls
    }

    pub fn controls_mut(&mut self) -> &mut Controls {
        &mut self.controls
    }
}

impl fmt::Debug for Camera {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Camera")
            .field("card", &self.caps.card)
            .field("family", &self.negotiated.family)
            .field("format", &self.negotiated.format)
            .field("state", &self.stream.state())
            .finish()
    }
}

impl fmt::Display for Camera {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (width, height) = self.size();
        write!(
            f,
            "{} ({} {}x{}, {})",
            self.caps.card,
            self.negotiated.family,
            width,
            height,
            if self.is_open() { "open" } else { "closed" }
        )
    }
}
