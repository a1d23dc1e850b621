//! A userspace driver for the Linux UVC gadget character device.
//!
//! This crate speaks the device side of USB Video Class 1.1: it decodes the
//! kernel's `v4l2_event` stream for a `/dev/videoN` gadget endpoint, answers
//! the host's Probe/Commit control handshake, and pushes producer frames
//! into the V4L2 MMAP queue in response to `STREAMON`/`DATA` events. An
//! optional proxy-connection subsystem lets a separate process own the
//! frame producer and hand frames across a Unix-domain socket and shared
//! memory instead of linking directly against [`Device`].
//!
//! ```no_run
//! use uvc_gadget::device::{Device, DeviceConfig};
//!
//! # fn main() -> uvc_gadget::error::Result<()> {
//! let config = DeviceConfig::new(vec!["/dev/video0".into()])?;
//! let device = Device::create(config)?;
//! // ... feed frames via `device.sink_data(0, &frame)` as they arrive ...
//! device.destroy();
//! # Ok(())
//! # }
//! ```

pub mod sys;
pub mod v4l2;

pub mod error;
pub mod format;

pub mod buffer;
pub mod control;
pub mod data;
pub mod event;

pub mod device;
pub mod proxy;

pub use device::{Device, DeviceConfig};
pub use error::{Result, UvcError};
