//! Webcam capture through video4linux mmap streaming
//!
//! ```no_run
//! use webcam::{Camera, Frame};
//!
//! let mut cam = Camera::new(0).unwrap();
//! cam.controls_mut().set("brightness", 128).ok();
//! match cam.capture_frame().unwrap() {
//!     Frame::Mjpeg(jpeg) => println!("jpeg, {} bytes", jpeg.len()),
//!     Frame::Rgb { width, height, .. } | Frame::Rgba { width, height, .. } => {
//!         println!("{}x{} pixels", width, height)
//!     }
//! }
//! ```

pub mod v4l2;

pub mod buffer;
pub mod camera;
pub mod capability;
pub mod config;
pub mod context;
pub mod control;
pub mod device;
pub mod error;
pub mod format;
pub mod fourcc;
pub mod memory;
pub mod stream;

#[cfg(test)]
mod mock;

pub use camera::{Camera, Frame};
pub use capability::Capabilities;
pub use config::Config;
pub use control::Controls;
pub use device::{Device, Handle};
pub use error::{ControlError, DeviceError, Error, Result};
pub use format::{Family, Format};
pub use fourcc::FourCC;
pub use stream::Stream;
