use std::collections::HashMap;
use std::os::raw::c_void;
use std::str::FromStr;
use std::sync::Arc;
use std::{fmt, io, mem};

use log::debug;

use crate::capability::string_from_cstr;
use crate::device::Handle;
use crate::error::ControlError;
use crate::v4l2::videodev::*;
use crate::v4l2::vidioc;

/// Image controls that can be addressed by name
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Cid {
    Brightness,
    Contrast,
    AutoWhiteBalance,
    Gamma,
    RedBalance,
    BlueBalance,
    HFlip,
    VFlip,
    WhiteBalanceTemperature,
    Sharpness,
    Rotate,
}

impl Cid {
    pub const ALL: [Cid; 11] = [
        Cid::Brightness,
        Cid::Contrast,
        Cid::AutoWhiteBalance,
        Cid::Gamma,
        Cid::RedBalance,
        Cid::BlueBalance,
        Cid::HFlip,
        Cid::VFlip,
        Cid::WhiteBalanceTemperature,
        Cid::Sharpness,
        Cid::Rotate,
    ];

    /// Name the control is addressed by
    pub fn name(&self) -> &'static str {
        match self {
            Cid::Brightness => "brightness",
            Cid::Contrast => "contrast",
            Cid::AutoWhiteBalance => "auto_white_balance",
            Cid::Gamma => "gamma",
            Cid::RedBalance => "red_balance",
            Cid::BlueBalance => "blue_balance",
            Cid::HFlip => "hflip",
            Cid::VFlip => "vflip",
            Cid::WhiteBalanceTemperature => "white_balance_temperature",
            Cid::Sharpness => "sharpness",
            Cid::Rotate => "rotate",
        }
    }

    /// Control identifier understood by the driver
    pub fn id(&self) -> u32 {
        match self {
            Cid::Brightness => V4L2_CID_BRIGHTNESS,
            Cid::Contrast => V4L2_CID_CONTRAST,
            Cid::AutoWhiteBalance => V4L2_CID_AUTO_WHITE_BALANCE,
            Cid::Gamma => V4L2_CID_GAMMA,
            Cid::RedBalance => V4L2_CID_RED_BALANCE,
            Cid::BlueBalance => V4L2_CID_BLUE_BALANCE,
            Cid::HFlip => V4L2_CID_HFLIP,
            Cid::VFlip => V4L2_CID_VFLIP,
            Cid::WhiteBalanceTemperature => V4L2_CID_WHITE_BALANCE_TEMPERATURE,
            Cid::Sharpness => V4L2_CID_SHARPNESS,
            Cid::Rotate => V4L2_CID_ROTATE,
        }
    }
}

impl FromStr for Cid {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Cid::ALL
            .iter()
            .find(|cid| cid.name() == s)
            .copied()
            .ok_or_else(|| ControlError::UnknownName(s.to_string()))
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How control values are interpreted
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Kind {
    Integer,
    Boolean,
}

impl From<u32> for Kind {
    fn from(repr: u32) -> Self {
        if repr == V4L2_CTRL_TYPE_BOOLEAN {
            Kind::Boolean
        } else {
            Kind::Integer
        }
    }
}

impl Kind {
    fn value(&self, raw: i32) -> Value {
        match self {
            Kind::Integer => Value::Integer(raw),
            Kind::Boolean => Value::Boolean(raw != 0),
        }
    }
}

bitflags::bitflags! {
    #[derive(PartialEq, Eq, Hash, Debug, Clone, Copy)]
    pub struct Flags: u32 {
        const DISABLED              = 0x0001;
        const GRABBED               = 0x0002;
        const READ_ONLY             = 0x0004;
        const UPDATE                = 0x0008;
        const INACTIVE              = 0x0010;
        const SLIDER                = 0x0020;
        const WRITE_ONLY            = 0x0040;
        const VOLATILE              = 0x0080;
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

/// Control value
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Value {
    Integer(i32),
    Boolean(bool),
}

impl Value {
    fn raw(&self) -> i32 {
        match *self {
            Value::Integer(v) => v,
            Value::Boolean(v) => v as i32,
        }
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{}", v),
            Value::Boolean(v) => write!(f, "{}", v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Device control description
pub struct Description {
    /// Control identifier
    pub id: u32,
    /// Name of the control, intended for the user
    pub name: String,
    /// Minimum value, inclusive
    pub minimum: i32,
    /// Maximum value, inclusive
    pub maximum: i32,
    /// Default value
    pub default: i32,
    /// Type of control
    pub kind: Kind,
    /// Control flags
    pub flags: Flags,
}

impl Description {
    /// Brings `value` into `[minimum, maximum]`
    ///
    /// A driver reporting `minimum > maximum` gets `minimum`.
    pub fn clamp(&self, value: i32) -> i32 {
        self.minimum.max(self.maximum.min(value))
    }
}

impl From<v4l2_queryctrl> for Description {
    fn from(ctrl: v4l2_queryctrl) -> Self {
        Self {
            id: ctrl.id,
            name: string_from_cstr(&ctrl.name),
            minimum: ctrl.minimum,
            maximum: ctrl.maximum,
            default: ctrl.default_value,
            kind: Kind::from(ctrl.type_),
            flags: Flags::from(ctrl.flags),
        }
    }
}

impl fmt::Display for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:?}): {}..={}, default {}",
            self.name, self.kind, self.minimum, self.maximum, self.default
        )?;
        if !self.flags.is_empty() {
            write!(f, " [{}]", self.flags)?;
        }
        Ok(())
    }
}

/// What is known about a control
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    /// The driver has not been asked yet
    NotQueried,
    Available(Description),
    /// The driver does not implement the control
    Unavailable,
}

/// Queries a control description from the driver
pub fn query(handle: &dyn Handle, id: u32) -> io::Result<Description> {
    let mut v4l2_ctrl = v4l2_queryctrl {
        id,
        ..unsafe { mem::zeroed() }
    };
    unsafe {
        handle.ioctl(
            vidioc::VIDIOC_QUERYCTRL,
            &mut v4l2_ctrl as *mut _ as *mut c_void,
        )?;
    }

    Ok(Description::from(v4l2_ctrl))
}

/// Named access to the image controls of a device
///
/// Control descriptions are queried on first use and cached for the lifetime of the manager.
/// A control the driver does not implement is remembered as unavailable and never queried
/// again.
pub struct Controls {
    handle: Arc<dyn Handle>,
    cache: HashMap<Cid, Availability>,
}

impl Controls {
    pub fn new(handle: Arc<dyn Handle>) -> Self {
        Controls {
            handle,
            cache: HashMap::new(),
        }
    }

    fn resolve(&mut self, cid: Cid) -> &Availability {
        let handle = &self.handle;
        self.cache.entry(cid).or_insert_with(|| {
            match query(handle.as_ref(), cid.id()) {
                Ok(desc) => {
                    debug!("control {}: {}", cid, desc);
                    Availability::Available(desc)
                }
                Err(e) => {
                    debug!("control {} is unavailable: {}", cid, e);
                    Availability::Unavailable
                }
            }
        })
    }

    /// Returns the cached knowledge about a control without talking to the driver
    pub fn status(&self, name: &str) -> Result<Availability, ControlError> {
        let cid: Cid = name.parse()?;
        Ok(self
            .cache
            .get(&cid)
            .cloned()
            .unwrap_or(Availability::NotQueried))
    }

    /// Returns the description of a control, querying the driver on first access
    pub fn describe(&mut self, name: &str) -> Result<&Description, ControlError> {
        let cid: Cid = name.parse()?;
        match self.resolve(cid) {
            Availability::Available(desc) => Ok(desc),
            _ => Err(ControlError::Unavailable(name.to_string())),
        }
    }

    /// Reads the current value of a control
    pub fn get(&mut self, name: &str) -> Result<Value, ControlError> {
        let desc = self.describe(name)?;
        let kind = desc.kind;
        let mut v4l2_ctrl = v4l2_control {
            id: desc.id,
            value: 0,
        };
        unsafe {
            self.handle.ioctl(
                vidioc::VIDIOC_G_CTRL,
                &mut v4l2_ctrl as *mut _ as *mut c_void,
            )?;
        }

        Ok(kind.value(v4l2_ctrl.value))
    }

    /// Writes a control, clamping the value into the range the driver reported
    ///
    /// Returns the value that was actually written.
    pub fn set<V: Into<Value>>(&mut self, name: &str, value: V) -> Result<Value, ControlError> {
        let desc = self.describe(name)?;
        let requested = value.into().raw();
        let clamped = desc.clamp(requested);
        if clamped != requested {
            debug!("clamping {} from {} to {}", name, requested, clamped);
        }

        let kind = desc.kind;
        let mut v4l2_ctrl = v4l2_control {
            id: desc.id,
            value: clamped,
        };
        unsafe {
            self.handle.ioctl(
                vidioc::VIDIOC_S_CTRL,
                &mut v4l2_ctrl as *mut _ as *mut c_void,
            )?;
        }

        Ok(kind.value(clamped))
    }
}
