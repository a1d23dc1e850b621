//! Hand-derived ioctl request codes for the V4L2/UVC gadget ABI.
//!
//! Mirrors the bit layout of `linux/ioctl.h` the same way the capture-device
//! side of this crate derives `VIDIOC_*` codes, but without a bindgen step:
//! the gadget-specific codes (`UVCIOC_SEND_RESPONSE`, event subscribe/dequeue)
//! are not part of any crate on crates.io, so they are derived here directly.

use super::v4l2_abi::{uvc_request_data, v4l2_buffer, v4l2_event, v4l2_event_subscription};
use super::v4l2_abi::{v4l2_capability, v4l2_format, v4l2_requestbuffers};

#[cfg(not(target_env = "musl"))]
#[allow(non_camel_case_types)]
pub type IocType = std::os::raw::c_ulong;
#[cfg(target_env = "musl")]
#[allow(non_camel_case_types)]
pub type IocType = std::os::raw::c_int;

const IOC_NRBITS: u8 = 8;
const IOC_TYPEBITS: u8 = 8;
const IOC_SIZEBITS: u8 = 14;

const IOC_NRSHIFT: u8 = 0;
const IOC_TYPESHIFT: u8 = IOC_NRSHIFT + IOC_NRBITS;
const IOC_SIZESHIFT: u8 = IOC_TYPESHIFT + IOC_TYPEBITS;
const IOC_DIRSHIFT: u8 = IOC_SIZESHIFT + IOC_SIZEBITS;

const IOC_NONE: u8 = 0;
const IOC_WRITE: u8 = 1;
const IOC_READ: u8 = 2;

macro_rules! ioc {
    ($dir:expr, $type:expr, $nr:expr, $size:expr) => {
        (($dir as IocType) << IOC_DIRSHIFT)
            | (($type as IocType) << IOC_TYPESHIFT)
            | (($nr as IocType) << IOC_NRSHIFT)
            | (($size as IocType) << IOC_SIZESHIFT)
    };
}

macro_rules! io {
    ($type:expr, $nr:expr) => {
        ioc!(IOC_NONE, $type, $nr, 0)
    };
}

macro_rules! ior {
    ($type:expr, $nr:expr, $arg:ty) => {
        ioc!(IOC_READ, $type, $nr, std::mem::size_of::<$arg>())
    };
}

macro_rules! iow {
    ($type:expr, $nr:expr, $arg:ty) => {
        ioc!(IOC_WRITE, $type, $nr, std::mem::size_of::<$arg>())
    };
}

macro_rules! iowr {
    ($type:expr, $nr:expr, $arg:ty) => {
        ioc!(IOC_READ | IOC_WRITE, $type, $nr, std::mem::size_of::<$arg>())
    };
}

pub const VIDIOC_QUERYCAP: IocType = ior!(b'V', 0, v4l2_capability);
pub const VIDIOC_S_FMT: IocType = iowr!(b'V', 5, v4l2_format);
pub const VIDIOC_REQBUFS: IocType = iowr!(b'V', 8, v4l2_requestbuffers);
pub const VIDIOC_QUERYBUF: IocType = iowr!(b'V', 9, v4l2_buffer);
pub const VIDIOC_QBUF: IocType = iowr!(b'V', 15, v4l2_buffer);
pub const VIDIOC_DQBUF: IocType = iowr!(b'V', 17, v4l2_buffer);
pub const VIDIOC_STREAMON: IocType = iow!(b'V', 18, std::os::raw::c_int);
pub const VIDIOC_STREAMOFF: IocType = iow!(b'V', 19, std::os::raw::c_int);
pub const VIDIOC_DQEVENT: IocType = ior!(b'V', 89, v4l2_event);
pub const VIDIOC_SUBSCRIBE_EVENT: IocType = iow!(b'V', 90, v4l2_event_subscription);
pub const VIDIOC_UNSUBSCRIBE_EVENT: IocType = iow!(b'V', 91, v4l2_event_subscription);

/// Not a VIDIOC_* code: defined by the UVC gadget function (`linux/usb/g_uvc.h`) under the
/// 'U' ioctl magic rather than 'V'.
pub const UVCIOC_SEND_RESPONSE: IocType = iow!(b'U', 1, uvc_request_data);
