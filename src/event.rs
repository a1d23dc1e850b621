//! Kernel event decoding: dequeues `v4l2_event` from a gadget fd and
//! classifies it into a small Rust sum type, per the tagged-event-union
//! Design Note. The raw byte buffer never crosses this boundary.
//!
//! Grounded on `original_source/.../uvc_impl.c`'s `uvc_handle_events` /
//! `uvc_handle_setup_event` / `uvc_handle_data_event` dispatch on
//! `v4l2_event.type`.

use std::os::raw::c_int;

use crate::sys::ioctl;
use crate::sys::usb_video::{USB_RECIP_MASK, USB_TYPE_MASK};
use crate::sys::v4l2_abi::{
    usb_ctrlrequest, v4l2_event, UVC_EVENT_CONNECT, UVC_EVENT_DATA, UVC_EVENT_DISCONNECT,
    UVC_EVENT_SETUP, UVC_EVENT_STREAMOFF, UVC_EVENT_STREAMON,
};
use crate::v4l2;

/// A decoded USB control-transfer SETUP packet (USB 9.3).
#[derive(Debug, Clone, Copy)]
pub struct UsbCtrl {
    pub b_request_type: u8,
    pub b_request: u8,
    pub w_value: u16,
    pub w_index: u16,
    pub w_length: u16,
}

impl From<usb_ctrlrequest> for UsbCtrl {
    fn from(req: usb_ctrlrequest) -> Self {
        let (b_request_type, b_request, w_value, w_index, w_length) = (
            req.b_request_type,
            req.b_request,
            req.w_value,
            req.w_index,
            req.w_length,
        );
        UsbCtrl {
            b_request_type,
            b_request,
            w_value,
            w_index,
            w_length,
        }
    }
}

impl UsbCtrl {
    pub fn request_type(&self) -> u8 {
        self.b_request_type & USB_TYPE_MASK
    }

    pub fn recipient(&self) -> u8 {
        self.b_request_type & USB_RECIP_MASK
    }

    /// Entity/unit/terminal ID: the high byte of `wIndex`.
    pub fn entity_id(&self) -> u8 {
        (self.w_index >> 8) as u8
    }

    /// Interface number, offset-adjusted per endpoint (spec §4.3): the low
    /// byte of `wIndex` minus `endpoint * 2`.
    pub fn interface(&self, endpoint: usize) -> u8 {
        ((self.w_index & 0xff) as i32 - (endpoint as i32) * 2) as u8
    }

    /// Control selector: the high byte of `wValue`.
    pub fn selector(&self) -> u8 {
        (self.w_value >> 8) as u8
    }
}

pub const CONTROL_INTERFACE: u8 = 0;
pub const STREAMING_INTERFACE: u8 = 1;

/// A decoded kernel event. `Setup`/`Data` are the only variants that carry a
/// payload; the rest are pure signals.
#[derive(Debug, Clone)]
pub enum Event {
    Connect,
    Disconnect,
    StreamOn,
    StreamOff,
    Setup(UsbCtrl),
    Data(Vec<u8>),
}

/// Dequeues and classifies exactly one `v4l2_event` from `fd` (called in
/// response to `POLLPRI` readiness).
pub fn dequeue(fd: c_int) -> std::io::Result<Event> {
    let mut raw = v4l2_event::default();
    unsafe {
        v4l2::ioctl(
            fd,
            ioctl::VIDIOC_DQEVENT,
            &mut raw as *mut _ as *mut std::os::raw::c_void,
        )?;
    }
    Ok(classify(&raw))
}

fn classify(raw: &v4l2_event) -> Event {
    match raw.type_ {
        t if t == UVC_EVENT_CONNECT => Event::Connect,
        t if t == UVC_EVENT_DISCONNECT => Event::Disconnect,
        t if t == UVC_EVENT_STREAMON => Event::StreamOn,
        t if t == UVC_EVENT_STREAMOFF => Event::StreamOff,
        t if t == UVC_EVENT_SETUP => Event::Setup(raw.as_ctrlrequest().into()),
        t if t == UVC_EVENT_DATA => {
            // The kernel puts the DATA-phase length in the leading i32 of the
            // union payload (mirrors `struct uvc_request_data`); the bytes
            // following it are the payload itself.
            let len = i32::from_ne_bytes(raw.u[0..4].try_into().unwrap()).max(0) as usize;
            Event::Data(raw.as_data(4 + len)[4..].to_vec())
        }
        other => {
            log::warn!("unrecognized v4l2_event type {other:#x}");
            Event::Disconnect
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctrl(b_request_type: u8, w_value: u16, w_index: u16) -> UsbCtrl {
        UsbCtrl {
            b_request_type,
            b_request: 0,
            w_value,
            w_index,
            w_length: 0,
        }
    }

    #[test]
    fn decodes_entity_and_selector_from_wvalue_windex() {
        // selector 0x02 (CS), entity 1 (Input Terminal), interface 0.
        let c = ctrl(0x21, 0x0200, 0x0100);
        assert_eq!(c.selector(), 0x02);
        assert_eq!(c.entity_id(), 1);
        assert_eq!(c.interface(0), 0);
    }

    #[test]
    fn interface_offset_adjusts_by_endpoint() {
        let c = ctrl(0x21, 0x0100, 0x0102);
        assert_eq!(c.interface(1), 0);
    }
}
