//! In-process stand-in for a V4L2 capture driver
//!
//! `MockDevice` implements [`Handle`] and answers the ioctls the crate issues the way a
//! single-planar mmap capture driver does, so everything above the syscall layer can be tested
//! without hardware.

use std::collections::{HashMap, VecDeque};
use std::os::raw::{c_int, c_void};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use std::{io, mem};

use crate::device::Handle;
use crate::fourcc;
use crate::v4l2::videodev::*;
use crate::v4l2::vidioc;

const PAGE_SIZE: u32 = 4096;

fn errno(code: c_int) -> io::Error {
    io::Error::from_raw_os_error(code)
}

fn fill_cstr(dst: &mut [u8], src: &str) {
    let len = src.len().min(dst.len() - 1);
    dst[..len].copy_from_slice(&src.as_bytes()[..len]);
}

fn bytes_per_pixel(code: u32) -> u32 {
    match code {
        fourcc::V4L2_PIX_FMT_MJPEG | fourcc::V4L2_PIX_FMT_JPEG => 0,
        fourcc::V4L2_PIX_FMT_RGB332 | fourcc::V4L2_PIX_FMT_GREY => 1,
        fourcc::V4L2_PIX_FMT_RGB24 | fourcc::V4L2_PIX_FMT_BGR24 => 3,
        fourcc::V4L2_PIX_FMT_RGB32 | fourcc::V4L2_PIX_FMT_RGBA32 => 4,
        _ => 2,
    }
}

struct Slot {
    data: Vec<u8>,
    queued: bool,
}

struct Control {
    raw: v4l2_queryctrl,
    value: i32,
}

struct Kernel {
    caps: u32,
    formats: Vec<(u32, String)>,
    max: (u32, u32),
    format: v4l2_pix_format,
    controls: HashMap<u32, Control>,

    calls: Vec<u32>,
    requested: Vec<u32>,
    buffer_limit: u32,
    fail_reqbufs: bool,
    fail_mmap: Option<u32>,
    fail_close: bool,

    slots: Vec<Slot>,
    ready: VecDeque<u32>,
    streaming: bool,
    sequence: u32,
    mapped: usize,
    unmapped: usize,
    closed: bool,
}

impl Kernel {
    fn adjust(&self, pix: &mut v4l2_pix_format) {
        if !self.formats.iter().any(|(code, _)| *code == pix.pixelformat) {
            if let Some((code, _)) = self.formats.first() {
                pix.pixelformat = *code;
            }
        }

        pix.width = pix.width.max(1).min(self.max.0);
        pix.height = pix.height.max(1).min(self.max.1);
        pix.field = 1;

        let bpp = bytes_per_pixel(pix.pixelformat);
        pix.bytesperline = pix.width * bpp;
        pix.sizeimage = if bpp == 0 {
            pix.width * pix.height / 2
        } else {
            pix.bytesperline * pix.height
        };
    }

    fn stream_on(&mut self) -> io::Result<()> {
        if self.slots.is_empty() {
            return Err(errno(libc::EINVAL));
        }
        self.streaming = true;
        Ok(())
    }

    fn stream_off(&mut self) {
        self.streaming = false;
        self.ready.clear();
        for slot in &mut self.slots {
            slot.queued = false;
        }
    }

    fn compressed(&self) -> bool {
        bytes_per_pixel(self.format.pixelformat) == 0
    }

    /// Writes the next frame into buffer `index`, returns the payload size
    fn fill(&mut self, index: u32) -> u32 {
        self.sequence += 1;
        let compressed = self.compressed();
        let seq = self.sequence;
        let data = &mut self.slots[index as usize].data;

        if compressed {
            // a JPEG-ish payload whose size varies from frame to frame
            let used = (1024 + (seq as usize % 16) * 8).min(data.len());
            for (i, byte) in data[..used].iter_mut().enumerate() {
                *byte = (i as u32 ^ seq) as u8;
            }
            if used >= 4 {
                data[..2].copy_from_slice(&[0xff, 0xd8]);
                data[used - 2..used].copy_from_slice(&[0xff, 0xd9]);
            }
            used as u32
        } else {
            for byte in data.iter_mut() {
                *byte = seq as u8;
            }
            data.len() as u32
        }
    }

    unsafe fn ioctl(&mut self, request: u32, argp: *mut c_void) -> io::Result<()> {
        match request {
            vidioc::VIDIOC_QUERYCAP => {
                let cap = &mut *(argp as *mut v4l2_capability);
                fill_cstr(&mut cap.driver, "mock");
                fill_cstr(&mut cap.card, "Mock Camera");
                fill_cstr(&mut cap.bus_info, "platform:mock");
                cap.version = 0x0006_0100;
                cap.capabilities = self.caps;
                cap.device_caps = 0;
            }
            vidioc::VIDIOC_ENUM_FMT => {
                let desc = &mut *(argp as *mut v4l2_fmtdesc);
                if desc.type_ != V4L2_BUF_TYPE_VIDEO_CAPTURE {
                    return Err(errno(libc::EINVAL));
                }
                let (code, name) = self
                    .formats
                    .get(desc.index as usize)
                    .ok_or_else(|| errno(libc::EINVAL))?;
                desc.pixelformat = *code;
                desc.flags = if bytes_per_pixel(*code) == 0 { 1 } else { 0 };
                fill_cstr(&mut desc.description, name);
            }
            vidioc::VIDIOC_G_FMT => {
                let fmt = &mut *(argp as *mut v4l2_format);
                fmt.fmt.pix = self.format;
            }
            vidioc::VIDIOC_S_FMT => {
                let fmt = &mut *(argp as *mut v4l2_format);
                if fmt.type_ != V4L2_BUF_TYPE_VIDEO_CAPTURE {
                    return Err(errno(libc::EINVAL));
                }
                if !self.slots.is_empty() {
                    return Err(errno(libc::EBUSY));
                }
                let mut pix = fmt.fmt.pix;
                self.adjust(&mut pix);
                fmt.fmt.pix = pix;
                self.format = pix;
            }
            vidioc::VIDIOC_REQBUFS => {
                let req = &mut *(argp as *mut v4l2_requestbuffers);
                self.requested.push(req.count);
                if self.fail_reqbufs || req.memory != V4L2_MEMORY_MMAP {
                    return Err(errno(libc::EINVAL));
                }
                if self.streaming || self.mapped > self.unmapped {
                    return Err(errno(libc::EBUSY));
                }
                if req.count == 0 {
                    self.slots.clear();
                    self.ready.clear();
                    return Ok(());
                }
                if !self.slots.is_empty() {
                    return Err(errno(libc::EBUSY));
                }

                let len = self.format.sizeimage.max(1) as usize;
                req.count = req.count.min(self.buffer_limit);
                self.slots = (0..req.count)
                    .map(|_| Slot {
                        data: vec![0; len],
                        queued: false,
                    })
                    .collect();
            }
            vidioc::VIDIOC_QUERYBUF => {
                let buf = &mut *(argp as *mut v4l2_buffer);
                let slot = self
                    .slots
                    .get(buf.index as usize)
                    .ok_or_else(|| errno(libc::EINVAL))?;
                buf.length = slot.data.len() as u32;
                buf.m.offset = buf.index * PAGE_SIZE;
                buf.flags = if slot.queued { 0x2 } else { 0 };
            }
            vidioc::VIDIOC_QBUF => {
                let buf = &mut *(argp as *mut v4l2_buffer);
                let index = buf.index;
                let slot = self
                    .slots
                    .get_mut(index as usize)
                    .ok_or_else(|| errno(libc::EINVAL))?;
                if slot.queued {
                    return Err(errno(libc::EINVAL));
                }
                slot.queued = true;
                self.ready.push_back(index);
            }
            vidioc::VIDIOC_DQBUF => {
                let buf = &mut *(argp as *mut v4l2_buffer);
                if !self.streaming {
                    return Err(errno(libc::EINVAL));
                }
                let index = self.ready.pop_front().ok_or_else(|| errno(libc::EAGAIN))?;
                self.slots[index as usize].queued = false;
                let used = self.fill(index);

                buf.index = index;
                buf.bytesused = used;
                buf.sequence = self.sequence;
                buf.length = self.slots[index as usize].data.len() as u32;
                buf.m.offset = index * PAGE_SIZE;
                buf.flags = 0x4;
            }
            vidioc::VIDIOC_STREAMON => {
                if *(argp as *mut v4l2_buf_type) as u32 != V4L2_BUF_TYPE_VIDEO_CAPTURE {
                    return Err(errno(libc::EINVAL));
                }
                self.stream_on()?;
            }
            vidioc::VIDIOC_STREAMOFF => {
                if *(argp as *mut v4l2_buf_type) as u32 != V4L2_BUF_TYPE_VIDEO_CAPTURE {
                    return Err(errno(libc::EINVAL));
                }
                self.stream_off();
            }
            vidioc::VIDIOC_QUERYCTRL => {
                let query = &mut *(argp as *mut v4l2_queryctrl);
                let ctrl = self
                    .controls
                    .get(&query.id)
                    .ok_or_else(|| errno(libc::EINVAL))?;
                *query = ctrl.raw;
            }
            vidioc::VIDIOC_G_CTRL => {
                let control = &mut *(argp as *mut v4l2_control);
                let ctrl = self
                    .controls
                    .get(&control.id)
                    .ok_or_else(|| errno(libc::EINVAL))?;
                control.value = ctrl.value;
            }
            vidioc::VIDIOC_S_CTRL => {
                let control = &mut *(argp as *mut v4l2_control);
                let ctrl = self
                    .controls
                    .get_mut(&control.id)
                    .ok_or_else(|| errno(libc::EINVAL))?;
                if control.value < ctrl.raw.minimum || control.value > ctrl.raw.maximum {
                    return Err(errno(libc::ERANGE));
                }
                ctrl.value = control.value;
            }
            _ => return Err(errno(libc::ENOTTY)),
        }

        Ok(())
    }
}

/// Fake capture driver
pub struct MockDevice {
    kernel: Mutex<Kernel>,
}

impl MockDevice {
    /// A capture device offering YUYV and MJPEG up to 1280x720
    pub fn new() -> Self {
        let format = v4l2_pix_format {
            width: 640,
            height: 480,
            pixelformat: fourcc::V4L2_PIX_FMT_YUYV,
            field: 1,
            bytesperline: 640 * 2,
            sizeimage: 640 * 480 * 2,
            ..unsafe { mem::zeroed() }
        };

        MockDevice {
            kernel: Mutex::new(Kernel {
                caps: V4L2_CAP_VIDEO_CAPTURE | V4L2_CAP_STREAMING,
                formats: vec![
                    (fourcc::V4L2_PIX_FMT_YUYV, "YUYV 4:2:2".to_string()),
                    (fourcc::V4L2_PIX_FMT_MJPEG, "Motion-JPEG".to_string()),
                ],
                max: (1280, 720),
                format,
                controls: HashMap::new(),
                calls: Vec::new(),
                requested: Vec::new(),
                buffer_limit: 32,
                fail_reqbufs: false,
                fail_mmap: None,
                fail_close: false,
                slots: Vec::new(),
                ready: VecDeque::new(),
                streaming: false,
                sequence: 0,
                mapped: 0,
                unmapped: 0,
                closed: false,
            }),
        }
    }

    fn kernel(&self) -> MutexGuard<'_, Kernel> {
        self.kernel.lock().unwrap()
    }

    pub fn with_caps(self, caps: u32) -> Self {
        self.kernel().caps = caps;
        self
    }

    pub fn with_formats(self, formats: &[(u32, &str)]) -> Self {
        self.kernel().formats = formats
            .iter()
            .map(|(code, name)| (*code, name.to_string()))
            .collect();
        self
    }

    pub fn with_max_size(self, width: u32, height: u32) -> Self {
        self.kernel().max = (width, height);
        self
    }

    /// Grants at most `limit` buffers per request
    pub fn with_buffer_limit(self, limit: u32) -> Self {
        self.kernel().buffer_limit = limit;
        self
    }

    /// Rejects mmap buffer requests
    pub fn with_failing_reqbufs(self) -> Self {
        self.kernel().fail_reqbufs = true;
        self
    }

    /// Fails mapping the buffer at `index`
    pub fn with_failing_mmap(self, index: u32) -> Self {
        self.kernel().fail_mmap = Some(index);
        self
    }

    /// Reports an I/O error when the node is closed
    pub fn with_failing_close(self) -> Self {
        self.kernel().fail_close = true;
        self
    }

    fn add_control(self, id: u32, kind: u32, name: &str, range: (i32, i32), default: i32) -> Self {
        let mut raw: v4l2_queryctrl = unsafe { mem::zeroed() };
        raw.id = id;
        raw.type_ = kind;
        fill_cstr(&mut raw.name, name);
        raw.minimum = range.0;
        raw.maximum = range.1;
        raw.step = 1;
        raw.default_value = default;

        self.kernel().controls.insert(
            id,
            Control {
                raw,
                value: default,
            },
        );
        self
    }

    /// Adds an integer control
    pub fn with_control(
        self,
        id: u32,
        name: &str,
        minimum: i32,
        maximum: i32,
        default: i32,
    ) -> Self {
        self.add_control(id, V4L2_CTRL_TYPE_INTEGER, name, (minimum, maximum), default)
    }

    /// Adds a boolean control
    pub fn with_boolean(self, id: u32, name: &str, default: bool) -> Self {
        self.add_control(id, V4L2_CTRL_TYPE_BOOLEAN, name, (0, 1), default as i32)
    }

    /// Number of times `request` was issued, failed calls included
    pub fn ioctl_count(&self, request: u32) -> usize {
        self.kernel().calls.iter().filter(|r| **r == request).count()
    }

    /// Total number of ioctls issued
    pub fn ioctl_total(&self) -> usize {
        self.kernel().calls.len()
    }

    /// Buffer counts passed to `VIDIOC_REQBUFS`, in order
    pub fn requested_counts(&self) -> Vec<u32> {
        self.kernel().requested.clone()
    }

    pub fn mapped(&self) -> usize {
        self.kernel().mapped
    }

    pub fn unmapped(&self) -> usize {
        self.kernel().unmapped
    }

    pub fn is_closed(&self) -> bool {
        self.kernel().closed
    }

    pub fn is_streaming(&self) -> bool {
        self.kernel().streaming
    }

    /// Number of buffers currently owned by the driver
    pub fn queued(&self) -> usize {
        self.kernel().slots.iter().filter(|s| s.queued).count()
    }

    pub fn control_value(&self, id: u32) -> Option<i32> {
        self.kernel().controls.get(&id).map(|c| c.value)
    }

    /// The format last accepted by `VIDIOC_S_FMT`
    pub fn format(&self) -> v4l2_pix_format {
        self.kernel().format
    }

    /// Starts streaming without going through an ioctl
    pub fn stream_on(&self) {
        self.kernel().stream_on().unwrap();
    }

    /// Stops streaming without going through an ioctl
    pub fn stream_off(&self) {
        self.kernel().stream_off();
    }
}

impl Handle for MockDevice {
    unsafe fn ioctl(&self, request: u32, argp: *mut c_void) -> io::Result<()> {
        let mut kernel = self.kernel();
        kernel.calls.push(request);
        if kernel.closed {
            return Err(errno(libc::EBADF));
        }
        kernel.ioctl(request, argp)
    }

    unsafe fn mmap(&self, length: usize, offset: u32) -> io::Result<*mut u8> {
        let mut kernel = self.kernel();
        let index = offset / PAGE_SIZE;
        if kernel.fail_mmap == Some(index) {
            return Err(errno(libc::ENOMEM));
        }

        let slot = kernel
            .slots
            .get_mut(index as usize)
            .filter(|slot| offset % PAGE_SIZE == 0 && length <= slot.data.len())
            .ok_or_else(|| errno(libc::EINVAL))?;
        let ptr = slot.data.as_mut_ptr();
        kernel.mapped += 1;
        Ok(ptr)
    }

    unsafe fn munmap(&self, start: *mut u8, _length: usize) -> io::Result<()> {
        let mut kernel = self.kernel();
        if !kernel
            .slots
            .iter()
            .any(|slot| slot.data.as_ptr() == start as *const u8)
        {
            return Err(errno(libc::EINVAL));
        }
        kernel.unmapped += 1;
        Ok(())
    }

    fn poll(&self, _timeout: Option<Duration>) -> io::Result<bool> {
        let kernel = self.kernel();
        Ok(kernel.streaming && !kernel.ready.is_empty())
    }

    fn close(&self) -> io::Result<()> {
        let mut kernel = self.kernel();
        if kernel.closed {
            return Ok(());
        }
        kernel.closed = true;
        kernel.streaming = false;
        if kernel.fail_close {
            return Err(errno(libc::EIO));
        }
        Ok(())
    }
}
