//! Hand-rolled mirrors of the kernel V4L2/UVC gadget ABI structures.
//!
//! These are not bindgen output; they are written by hand the same way
//! `v4l2::videodev::v4l2_ext_controls` is carried by hand in the capture-device
//! side of this crate, because the real structures are C unions that bindgen
//! handles awkwardly and because `UVCIOC_SEND_RESPONSE`/`v4l2_event` and
//! friends are gadget-specific ABI not covered by any published sys crate.
//! Field layouts follow `linux/videodev2.h` and `linux/usb/video.h`.

use libc::{timespec, timeval};

pub const V4L2_BUF_TYPE_VIDEO_OUTPUT: u32 = 2;
pub const V4L2_MEMORY_MMAP: u32 = 1;
pub const V4L2_CAP_VIDEO_OUTPUT: u32 = 0x0000_0200;

/// Passed as the subscription `type_` to `VIDIOC_UNSUBSCRIBE_EVENT` to drop
/// every subscription on the fd in one call.
pub const V4L2_EVENT_ALL: u32 = 0;

pub const V4L2_BUF_FLAG_MAPPED: u32 = 0x0000_0001;
pub const V4L2_BUF_FLAG_QUEUED: u32 = 0x0000_0002;
pub const V4L2_BUF_FLAG_DONE: u32 = 0x0000_0004;

/// `V4L2_EVENT_PRIVATE_START` from `linux/videodev2.h`; UVC gadget events are
/// numbered relative to it in `linux/usb/video.h`.
const V4L2_EVENT_PRIVATE_START: u32 = 0x0800_0000;

pub const UVC_EVENT_CONNECT: u32 = V4L2_EVENT_PRIVATE_START;
pub const UVC_EVENT_DISCONNECT: u32 = V4L2_EVENT_PRIVATE_START + 1;
pub const UVC_EVENT_STREAMON: u32 = V4L2_EVENT_PRIVATE_START + 2;
pub const UVC_EVENT_STREAMOFF: u32 = V4L2_EVENT_PRIVATE_START + 3;
pub const UVC_EVENT_SETUP: u32 = V4L2_EVENT_PRIVATE_START + 4;
pub const UVC_EVENT_DATA: u32 = V4L2_EVENT_PRIVATE_START + 5;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct v4l2_capability {
    pub driver: [u8; 16],
    pub card: [u8; 32],
    pub bus_info: [u8; 32],
    pub version: u32,
    pub capabilities: u32,
    pub device_caps: u32,
    pub reserved: [u32; 3],
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct v4l2_requestbuffers {
    pub count: u32,
    pub type_: u32,
    pub memory: u32,
    pub capabilities: u32,
    pub flags: u8,
    pub reserved: [u8; 3],
}

impl Default for v4l2_requestbuffers {
    fn default() -> Self {
        unsafe { std::mem::zeroed() }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct v4l2_timecode {
    pub type_: u32,
    pub flags: u32,
    pub frames: u8,
    pub seconds: u8,
    pub minutes: u8,
    pub hours: u8,
    pub userbits: [u8; 4],
}

/// Flattened `v4l2_buffer`: instead of reproducing the kernel's `union m`
/// (offset / userptr / planes / fd), only the MMAP member (`offset`) is
/// carried, since this crate never uses USERPTR or DMABUF import. Same
/// philosophy as `v4l2::videodev::v4l2_ext_controls` upstream.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct v4l2_buffer {
    pub index: u32,
    pub type_: u32,
    pub bytesused: u32,
    pub flags: u32,
    pub field: u32,
    pub timestamp: timeval,
    pub timecode: v4l2_timecode,
    pub sequence: u32,
    pub memory: u32,
    pub m_offset: u32,
    pub length: u32,
    pub reserved2: u32,
    pub request_fd: i32,
}

impl Default for v4l2_buffer {
    fn default() -> Self {
        unsafe { std::mem::zeroed() }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct v4l2_pix_format {
    pub width: u32,
    pub height: u32,
    pub pixelformat: u32,
    pub field: u32,
    pub bytesperline: u32,
    pub sizeimage: u32,
    pub colorspace: u32,
    pub priv_: u32,
    pub flags: u32,
    pub ycbcr_enc: u32,
    pub quantization: u32,
    pub xfer_func: u32,
}

/// Flattened `v4l2_format`: only the `pix` member of the kernel union is
/// represented (the gadget only ever programs `V4L2_BUF_TYPE_VIDEO_OUTPUT`
/// with a single-planar pixel format), padded out to the union's on-wire size.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct v4l2_format {
    pub type_: u32,
    pub pix: v4l2_pix_format,
    _pad: [u8; 200 - std::mem::size_of::<v4l2_pix_format>()],
}

impl Default for v4l2_format {
    fn default() -> Self {
        v4l2_format {
            type_: 0,
            pix: v4l2_pix_format::default(),
            _pad: [0; 200 - std::mem::size_of::<v4l2_pix_format>()],
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct v4l2_event_subscription {
    pub type_: u32,
    pub id: u32,
    pub flags: u32,
    pub reserved: [u32; 5],
}

/// Flattened `v4l2_event`: the kernel union `u` (vsync/ctrl/frame_sync/
/// src_change/motion_det/`data[64]`) is represented purely as the raw 64-byte
/// payload, which is all the UVC gadget ever populates (a `usb_ctrlrequest`
/// or a `uvc_request_data`, both well under 64 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct v4l2_event {
    pub type_: u32,
    pub u: [u8; 64],
    pub pending: u32,
    pub sequence: u32,
    pub timestamp: timespec,
    pub id: u32,
    pub reserved: [u32; 8],
}

impl Default for v4l2_event {
    fn default() -> Self {
        unsafe { std::mem::zeroed() }
    }
}

/// `struct usb_ctrlrequest` (`linux/usb/ch9.h`), packed per USB 9.3.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, Default)]
pub struct usb_ctrlrequest {
    pub b_request_type: u8,
    pub b_request: u8,
    pub w_value: u16,
    pub w_index: u16,
    pub w_length: u16,
}

/// `struct uvc_request_data` (`linux/usb/g_uvc.h`): the payload handed to
/// `UVCIOC_SEND_RESPONSE`. A negative `length` signals a protocol stall.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct uvc_request_data {
    pub length: i32,
    pub data: [u8; 60],
}

impl Default for uvc_request_data {
    fn default() -> Self {
        uvc_request_data {
            length: 0,
            data: [0; 60],
        }
    }
}

impl v4l2_event {
    /// Interprets the raw event payload as a `usb_ctrlrequest`, valid for
    /// `UVC_EVENT_SETUP`.
    pub fn as_ctrlrequest(&self) -> usb_ctrlrequest {
        let mut req = usb_ctrlrequest::default();
        let size = std::mem::size_of::<usb_ctrlrequest>();
        unsafe {
            std::ptr::copy_nonoverlapping(
                self.u.as_ptr(),
                &mut req as *mut usb_ctrlrequest as *mut u8,
                size,
            );
        }
        req
    }

    /// Interprets the raw event payload's leading `wLength` bytes as the
    /// DATA-phase payload, valid for `UVC_EVENT_DATA`. The kernel puts the
    /// length in the first 4 bytes (mirrors `struct uvc_request_data`).
    pub fn as_data(&self, len: usize) -> &[u8] {
        let len = len.min(self.u.len());
        &self.u[..len]
    }
}
