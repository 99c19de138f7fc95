use std::io;

use thiserror::Error;

use crate::buffer::State;

/// Failures while bringing up or streaming from a capture device
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("device can not capture video")]
    NotCapturable,
    #[error("device does not support streaming I/O")]
    NoStreaming,
    #[error("device does not support RGB, RGBA or MJPEG format")]
    UnsupportedFormat,
    #[error("device does not support mmap-streaming: {0}")]
    MmapUnsupported(#[source] io::Error),
    #[error("driver returned unknown buffer index {0}")]
    InvalidBuffer(u32),
    #[error("buffer {index} is already {state}")]
    BufferState { index: u32, state: State },
    #[error("ioctl error: {0}")]
    Io(#[from] io::Error),
}

/// Failures while accessing image controls
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("control {0:?} is not supported")]
    UnknownName(String),
    #[error("control {0:?} is not available on this device")]
    Unavailable(String),
    #[error("ioctl error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Control(#[from] ControlError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
