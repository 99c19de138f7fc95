use std::{os::raw::c_void, sync::Arc};

use log::{debug, trace, warn};

use crate::buffer::{self, Pool};
use crate::device::Handle;
use crate::error::DeviceError;
use crate::v4l2::videodev::{v4l2_buf_type, V4L2_BUF_TYPE_VIDEO_CAPTURE};
use crate::v4l2::vidioc;

/// Streaming state of a capture engine
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum State {
    Stopped,
    Streaming,
}

/// Stream of mapped buffers
///
/// A buffer pool is used internally for buffer handling. Every captured frame is copied out of
/// its buffer before the buffer is handed back to the driver, so callers never see memory the
/// driver may write into.
pub struct Stream {
    pool: Pool,
    handle: Arc<dyn Handle>,
    active: bool,
}

impl Stream {
    /// Returns a stream for frame capturing with four buffers
    pub fn new(handle: Arc<dyn Handle>) -> Result<Self, DeviceError> {
        Stream::with_buffers(handle, 4)
    }

    pub fn with_buffers(handle: Arc<dyn Handle>, count: u32) -> Result<Self, DeviceError> {
        let pool = Pool::new(Arc::clone(&handle), count)?;

        Ok(Stream {
            pool,
            handle,
            active: false,
        })
    }

    pub fn state(&self) -> State {
        if self.active {
            State::Streaming
        } else {
            State::Stopped
        }
    }

    /// The buffers backing this stream
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    fn stream_ioctl(&self, request: u32) -> Result<(), DeviceError> {
        let mut typ = V4L2_BUF_TYPE_VIDEO_CAPTURE as v4l2_buf_type;
        unsafe {
            self.handle.ioctl(request, &mut typ as *mut _ as *mut c_void)?;
        }
        Ok(())
    }

    /// Starts streaming, does nothing if the stream is already running
    ///
    /// Buffers returned by a previous [`Stream::stop`] are queued again first.
    pub fn start(&mut self) -> Result<(), DeviceError> {
        if self.active {
            return Ok(());
        }

        let idle: Vec<u32> = self
            .pool
            .buffers()
            .iter()
            .filter(|buf| buf.state() == buffer::State::Dequeued)
            .map(|buf| buf.index())
            .collect();
        for index in idle {
            self.pool.queue(index)?;
        }

        self.stream_ioctl(vidioc::VIDIOC_STREAMON)?;
        self.active = true;
        debug!("streaming on with {} buffers", self.pool.len());
        Ok(())
    }

    /// Stops streaming, does nothing if the stream is not running
    ///
    /// The driver gives up all buffers when streaming stops.
    pub fn stop(&mut self) -> Result<(), DeviceError> {
        if !self.active {
            return Ok(());
        }

        self.stream_ioctl(vidioc::VIDIOC_STREAMOFF)?;
        self.active = false;
        self.pool.reclaim();
        debug!("streaming off");
        Ok(())
    }

    /// Stops streaming, then unmaps and frees all buffers
    ///
    /// The stream cannot be started again afterwards.
    pub fn release(&mut self) -> Result<(), DeviceError> {
        self.stop()?;
        self.pool.release()?;
        Ok(())
    }

    /// Captures one frame
    ///
    /// Starts the stream on first use. Blocks until the driver has a filled buffer, copies its
    /// payload and queues the buffer again right away.
    pub fn capture(&mut self) -> Result<Vec<u8>, DeviceError> {
        if !self.active {
            self.start()?;
        }

        let index = self.pool.dequeue()?;
        let data = self.pool.copy(index)?;
        self.pool.queue(index)?;

        trace!("captured {} bytes from buffer {}", data.len(), index);
        Ok(data)
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            match e {
                // ENODEV means the device went away (unplugged, bus failure), nothing to stop.
                DeviceError::Io(ref io) if io.raw_os_error() == Some(libc::ENODEV) => {
                    debug!("device gone while stopping stream")
                }
                e => warn!("failed to stop stream: {}", e),
            }
        }
    }
}
