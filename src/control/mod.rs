//! The UVC control plane: dispatches decoded `SETUP`/`DATA` events to the
//! Request Error Code, Input Terminal, Processing Unit and Probe/Commit
//! handlers, and drives the `UVCIOC_SEND_RESPONSE` reply/stall ioctl.
//!
//! Grounded on `original_source/.../uvc_impl.c`'s `uvc_events_process_setup`
//! / `uvc_events_process_class` / `uvc_events_process_data`.

pub mod apply;
pub mod entity;
pub mod streaming;

use std::os::raw::c_int;

use crate::control::apply::{apply_streaming_control, program_format};
use crate::control::entity::{ENTITY_DEVICE, ENTITY_INPUT_TERMINAL, ENTITY_PROCESSING_UNIT};
use crate::control::streaming::{StreamingControl, StreamingState, Target};
use crate::event::{UsbCtrl, CONTROL_INTERFACE, STREAMING_INTERFACE};
use crate::format::catalog::{Catalog, CATALOG};
use crate::sys::ioctl;
use crate::sys::usb_video::*;
use crate::sys::v4l2_abi::uvc_request_data;
use crate::v4l2;

/// The per-endpoint state the control plane carries across events: the
/// latched Request Error Code and the Probe/Commit negotiation state.
pub struct ControlPlane {
    catalog: &'static Catalog,
    error_code: u8,
    streaming: StreamingState,
}

impl Default for ControlPlane {
    fn default() -> Self {
        ControlPlane {
            catalog: &CATALOG,
            error_code: UVC_ERR_NO_ERROR,
            streaming: StreamingState::new(),
        }
    }
}

impl ControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolved (format, frame, interval), defaulting to the catalog's
    /// default triple before anything has been negotiated.
    fn resolved_selection(&self) -> (usize, usize, usize) {
        self.streaming
            .selection
            .unwrap_or(self.streaming.default_selection)
    }

    /// The negotiated format's catalog index, for callers outside the
    /// control plane that need to know which format the data plane is
    /// currently filling buffers for (e.g. to tell compressed formats from
    /// uncompressed ones).
    pub fn resolved_format(&self) -> usize {
        self.resolved_selection().0
    }

    /// The negotiated frame's catalog index, alongside [`resolved_format`](Self::resolved_format).
    pub fn resolved_frame(&self) -> usize {
        self.resolved_selection().1
    }

    /// Handles a decoded `SETUP` event for the given endpoint, returning the
    /// reply or stall that should be sent via `send_response`.
    pub fn handle_setup(&mut self, ctrl: &UsbCtrl, endpoint: usize) -> entity::Reply {
        use entity::Reply;

        let reply = self.dispatch_setup(ctrl, endpoint);
        if let Reply::Stall(code) = reply {
            self.error_code = code;
        } else {
            self.error_code = UVC_ERR_NO_ERROR;
        }
        reply
    }

    fn dispatch_setup(&mut self, ctrl: &UsbCtrl, endpoint: usize) -> entity::Reply {
        use entity::Reply;

        let request_type = ctrl.request_type();
        if request_type == USB_TYPE_STANDARD {
            return Reply::Data(Vec::new());
        }
        if request_type != USB_TYPE_CLASS {
            return Reply::Stall(UVC_ERR_INVALID_REQUEST);
        }
        if ctrl.recipient() != USB_RECIP_INTERFACE {
            return Reply::Stall(UVC_ERR_INVALID_REQUEST);
        }

        match ctrl.interface(endpoint) {
            CONTROL_INTERFACE => self.dispatch_control_interface(ctrl),
            STREAMING_INTERFACE => self.dispatch_streaming_interface(ctrl),
            _ => Reply::Stall(UVC_ERR_INVALID_REQUEST),
        }
    }

    fn dispatch_control_interface(&mut self, ctrl: &UsbCtrl) -> entity::Reply {
        match ctrl.entity_id() {
            ENTITY_DEVICE => entity::request_error_code(ctrl, self.error_code),
            ENTITY_INPUT_TERMINAL => entity::input_terminal(ctrl),
            ENTITY_PROCESSING_UNIT => entity::processing_unit(ctrl),
            _ => entity::Reply::Stall(UVC_ERR_INVALID_CONTROL),
        }
    }

    fn dispatch_streaming_interface(&mut self, ctrl: &UsbCtrl) -> entity::Reply {
        use entity::Reply;

        let selector = ctrl.selector();
        if selector == UVC_STREAM_ERROR_CODE_CONTROL {
            return Reply::Stall(UVC_ERR_INVALID_REQUEST);
        }
        let target = match selector {
            UVC_VS_PROBE_CONTROL => Target::Probe,
            UVC_VS_COMMIT_CONTROL => Target::Commit,
            _ => return Reply::Stall(UVC_ERR_INVALID_CONTROL),
        };

        match ctrl.b_request {
            UVC_GET_CUR => match self.streaming.current() {
                Some(sc) => Reply::Data(sc.as_bytes().to_vec()),
                None => Reply::Stall(UVC_ERR_INVALID_REQUEST),
            },
            UVC_GET_MIN => Reply::Data(StreamingControl::minimum(self.catalog).as_bytes().to_vec()),
            UVC_GET_MAX => Reply::Data(StreamingControl::maximum(self.catalog).as_bytes().to_vec()),
            UVC_GET_DEF => Reply::Data(
                StreamingControl::default_for(self.catalog, self.streaming.default_selection)
                    .as_bytes()
                    .to_vec(),
            ),
            UVC_GET_RES => Reply::Data(StreamingControl::default().as_bytes().to_vec()),
            UVC_GET_LEN => Reply::Data(vec![0, streaming::STREAMING_CONTROL_SIZE as u8]),
            UVC_GET_INFO => Reply::Data(vec![UVC_CONTROL_CAP_GET | UVC_CONTROL_CAP_SET]),
            UVC_SET_CUR => {
                self.streaming.set_cur_target(target);
                self.streaming.expected_len = Some(ctrl.w_length as usize);
                Reply::Data(vec![0u8; ctrl.w_length as usize])
            }
            _ => Reply::Stall(UVC_ERR_INVALID_REQUEST),
        }
    }

    /// Handles the `DATA` event that follows a `SET_CUR`: compares the
    /// payload against "current" and applies it if different.
    pub fn handle_data(&mut self, payload: &[u8]) {
        let incoming = StreamingControl::from_bytes(payload);

        let current = match self.streaming.current_mut() {
            Some(c) => c,
            None => {
                log::warn!("DATA event with no pending SET_CUR target, ignoring");
                return;
            }
        };

        if *current == incoming {
            return;
        }

        let selection = self.resolved_selection();
        let new_selection =
            apply_streaming_control(self.catalog, current, &incoming, selection);
        self.streaming.selection = Some(new_selection);
    }

    /// Programs the V4L2 output format to match the negotiated selection.
    /// Call once a Commit's `DATA` phase has been applied.
    pub fn program_format(&self, fd: c_int) -> std::io::Result<()> {
        program_format(fd, self.catalog, self.resolved_selection())
    }
}

/// Sends a reply or stall via `UVCIOC_SEND_RESPONSE`. A stall is modeled by
/// the kernel-documented sentinel: `length = -EL2HLT`.
pub fn send_response(fd: c_int, reply: &entity::Reply) -> std::io::Result<()> {
    let mut resp = uvc_request_data {
        length: 0,
        data: [0u8; 60],
    };

    match reply {
        entity::Reply::Data(bytes) => {
            let n = bytes.len().min(resp.data.len());
            resp.data[..n].copy_from_slice(&bytes[..n]);
            resp.length = n as i32;
        }
        entity::Reply::Stall(_) => {
            resp.length = -EL2HLT;
        }
    }

    unsafe {
        v4l2::ioctl(
            fd,
            ioctl::UVCIOC_SEND_RESPONSE,
            &mut resp as *mut _ as *mut std::os::raw::c_void,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entity::Reply;

    fn setup(request_type: u8, b_request: u8, selector: u8, entity: u8, interface: u8, len: u16) -> UsbCtrl {
        UsbCtrl {
            b_request_type: request_type,
            b_request,
            w_value: (selector as u16) << 8,
            w_index: ((entity as u16) << 8) | interface as u16,
            w_length: len,
        }
    }

    #[test]
    fn get_cur_before_any_set_cur_stalls() {
        let mut plane = ControlPlane::new();
        let ctrl = setup(0xa1, UVC_GET_CUR, UVC_VS_PROBE_CONTROL, 0, STREAMING_INTERFACE, 34);
        match plane.handle_setup(&ctrl, 0) {
            Reply::Stall(code) => assert_eq!(code, UVC_ERR_INVALID_REQUEST),
            Reply::Data(_) => panic!("expected stall before negotiation"),
        }
    }

    #[test]
    fn set_cur_then_data_updates_current() {
        let mut plane = ControlPlane::new();
        let set_cur = setup(0x21, UVC_SET_CUR, UVC_VS_PROBE_CONTROL, 0, STREAMING_INTERFACE, 34);
        let reply = plane.handle_setup(&set_cur, 0);
        assert!(matches!(reply, Reply::Data(ref b) if b.len() == 34));

        let desired = StreamingControl::for_selection(&CATALOG, 1, 0, 0);
        plane.handle_data(&desired.as_bytes());

        let get_cur = setup(0xa1, UVC_GET_CUR, UVC_VS_PROBE_CONTROL, 0, STREAMING_INTERFACE, 34);
        match plane.handle_setup(&get_cur, 0) {
            Reply::Data(bytes) => assert_eq!(bytes, desired.as_bytes().to_vec()),
            Reply::Stall(_) => panic!("expected current control after SET_CUR/DATA"),
        }
    }

    #[test]
    fn request_error_code_reports_last_stall() {
        let mut plane = ControlPlane::new();
        let bad = setup(0xa1, UVC_GET_CUR, UVC_VS_PROBE_CONTROL, 0, STREAMING_INTERFACE, 34);
        let _ = plane.handle_setup(&bad, 0);

        let query = setup(0xa1, UVC_GET_CUR, UVC_VC_REQUEST_ERROR_CODE_CONTROL, ENTITY_DEVICE, CONTROL_INTERFACE, 1);
        match plane.handle_setup(&query, 0) {
            Reply::Data(bytes) => assert_eq!(bytes, vec![UVC_ERR_INVALID_REQUEST]),
            Reply::Stall(_) => panic!("Request Error Code Control should not itself stall"),
        }
    }
}
