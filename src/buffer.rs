use std::{fmt, io, mem, os::raw::c_void, sync::Arc};

use log::{debug, trace, warn};

use crate::device::Handle;
use crate::error::DeviceError;
use crate::memory::Mapping;
use crate::v4l2::videodev::*;
use crate::v4l2::vidioc;

/// Ownership of a buffer at a given moment
///
/// A queued buffer belongs to the driver, which may be writing a frame into it. A dequeued
/// buffer belongs to the application and its contents are stable.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum State {
    Queued,
    Dequeued,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Queued => write!(f, "queued"),
            State::Dequeued => write!(f, "dequeued"),
        }
    }
}

/// Driver-allocated frame buffer mapped into the process
#[derive(Debug)]
pub struct Buffer {
    index: u32,
    mapping: Mapping,
    state: State,
    bytesused: u32,
    sequence: u32,
}

impl Buffer {
    /// Index assigned by the driver
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Size of the mapped region in bytes
    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Payload size reported with the last dequeued frame
    pub fn bytesused(&self) -> u32 {
        self.bytesused
    }

    /// Frame counter reported with the last dequeued frame
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Frame payload, or `None` while the driver owns the buffer
    ///
    /// Drivers that leave `bytesused` at zero are taken to have filled the whole region.
    pub fn data(&self) -> Option<&[u8]> {
        if self.state == State::Queued {
            return None;
        }

        let bytes = self.mapping.as_slice();
        let used = self.bytesused as usize;
        if used == 0 || used > bytes.len() {
            Some(bytes)
        } else {
            Some(&bytes[..used])
        }
    }
}

/// Fixed set of memory-mapped buffers shared with the driver
///
/// The pool requests its buffers with `VIDIOC_REQBUFS`, maps every one of them and hands all of
/// them to the driver right away. Dropping the pool unmaps the buffers and returns them to the
/// driver by requesting zero buffers.
pub struct Pool {
    handle: Arc<dyn Handle>,
    bufs: Vec<Buffer>,
    requested: bool,
}

impl Pool {
    /// Allocates, maps and queues up to `count` buffers
    ///
    /// The driver may grant fewer buffers than requested. Whatever was acquired before a failure
    /// is released again before the error is returned.
    pub fn new(handle: Arc<dyn Handle>, count: u32) -> Result<Self, DeviceError> {
        let mut pool = Pool {
            handle,
            bufs: Vec::new(),
            requested: false,
        };

        let granted = pool.request(count).map_err(DeviceError::MmapUnsupported)?;
        pool.requested = true;
        if granted == 0 {
            return Err(DeviceError::MmapUnsupported(io::Error::new(
                io::ErrorKind::Other,
                "driver granted no buffers",
            )));
        }

        for index in 0..granted {
            let raw = pool.query(index)?;
            let offset = unsafe { raw.m.offset };
            let mapping = Mapping::new(Arc::clone(&pool.handle), raw.length as usize, offset)
                .map_err(DeviceError::MmapUnsupported)?;

            pool.bufs.push(Buffer {
                index,
                mapping,
                state: State::Dequeued,
                bytesused: 0,
                sequence: 0,
            });
            pool.queue(index)?;
        }

        debug!("mapped {} buffers ({} requested)", granted, count);
        Ok(pool)
    }

    fn desc(&self, index: u32) -> v4l2_buffer {
        v4l2_buffer {
            index,
            type_: V4L2_BUF_TYPE_VIDEO_CAPTURE,
            memory: V4L2_MEMORY_MMAP,
            ..unsafe { mem::zeroed() }
        }
    }

    fn request(&self, count: u32) -> io::Result<u32> {
        let mut v4l2_reqbufs = v4l2_requestbuffers {
            count,
            type_: V4L2_BUF_TYPE_VIDEO_CAPTURE,
            memory: V4L2_MEMORY_MMAP,
            ..unsafe { mem::zeroed() }
        };
        unsafe {
            self.handle.ioctl(
                vidioc::VIDIOC_REQBUFS,
                &mut v4l2_reqbufs as *mut _ as *mut c_void,
            )?;
        }

        Ok(v4l2_reqbufs.count)
    }

    fn query(&self, index: u32) -> io::Result<v4l2_buffer> {
        let mut v4l2_buf = self.desc(index);
        unsafe {
            self.handle.ioctl(
                vidioc::VIDIOC_QUERYBUF,
                &mut v4l2_buf as *mut _ as *mut c_void,
            )?;
        }

        Ok(v4l2_buf)
    }

    /// Hands a dequeued buffer back to the driver
    pub fn queue(&mut self, index: u32) -> Result<(), DeviceError> {
        let buf = self
            .bufs
            .get(index as usize)
            .ok_or(DeviceError::InvalidBuffer(index))?;
        if buf.state == State::Queued {
            return Err(DeviceError::BufferState {
                index,
                state: State::Queued,
            });
        }

        let mut v4l2_buf = self.desc(index);
        unsafe {
            self.handle
                .ioctl(vidioc::VIDIOC_QBUF, &mut v4l2_buf as *mut _ as *mut c_void)?;
        }

        self.bufs[index as usize].state = State::Queued;
        trace!("queued buffer {}", index);
        Ok(())
    }

    /// Takes the next filled buffer from the driver and returns its index
    ///
    /// Blocks until a frame is ready unless the device was opened non-blocking.
    pub fn dequeue(&mut self) -> Result<u32, DeviceError> {
        let mut v4l2_buf = self.desc(0);
        unsafe {
            self.handle
                .ioctl(vidioc::VIDIOC_DQBUF, &mut v4l2_buf as *mut _ as *mut c_void)?;
        }

        let index = v4l2_buf.index;
        let buf = self
            .bufs
            .get_mut(index as usize)
            .ok_or(DeviceError::InvalidBuffer(index))?;
        if buf.state != State::Queued {
            return Err(DeviceError::BufferState {
                index,
                state: buf.state,
            });
        }

        buf.state = State::Dequeued;
        buf.bytesused = v4l2_buf.bytesused;
        buf.sequence = v4l2_buf.sequence;
        trace!(
            "dequeued buffer {} (sequence {}, {} bytes)",
            index,
            buf.sequence,
            buf.bytesused
        );
        Ok(index)
    }

    /// Copies the payload of a dequeued buffer
    pub fn copy(&self, index: u32) -> Result<Vec<u8>, DeviceError> {
        let buf = self
            .bufs
            .get(index as usize)
            .ok_or(DeviceError::InvalidBuffer(index))?;
        buf.data()
            .map(<[u8]>::to_vec)
            .ok_or(DeviceError::BufferState {
                index,
                state: buf.state,
            })
    }

    /// Marks every buffer as owned by the application
    ///
    /// `VIDIOC_STREAMOFF` implicitly dequeues all buffers, this brings the bookkeeping in line.
    pub fn reclaim(&mut self) {
        for buf in &mut self.bufs {
            buf.state = State::Dequeued;
        }
    }

    pub fn get(&self, index: u32) -> Option<&Buffer> {
        self.bufs.get(index as usize)
    }

    pub fn buffers(&self) -> &[Buffer] {
        &self.bufs
    }

    pub fn len(&self) -> usize {
        self.bufs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bufs.is_empty()
    }

    /// Unmaps all buffers and frees them in the driver
    ///
    /// Every region is unmapped even if an earlier one fails. The first error is returned.
    pub fn release(&mut self) -> io::Result<()> {
        let mut ret = Ok(());
        for buf in self.bufs.drain(..) {
            if let Err(e) = buf.mapping.unmap() {
                if ret.is_ok() {
                    ret = Err(e);
                }
            }
        }

        if self.requested {
            self.requested = false;
            self.request(0)?;
        }

        ret
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("failed to release buffers: {}", e);
        }
    }
}
