//! The three non-streaming control endpoints of the Video Control interface:
//! Request Error Code (entity 0), Input Terminal auto-exposure (entity 1),
//! and Processing Unit brightness (entity 2).
//!
//! Grounded on `original_source/.../uvc_impl.c`'s `uvc_events_process_control`.

use crate::event::UsbCtrl;
use crate::sys::usb_video::*;

pub const ENTITY_DEVICE: u8 = UVC_VC_ENTITY_DEVICE;
pub const ENTITY_INPUT_TERMINAL: u8 = UVC_VC_ENTITY_INPUT_TERMINAL;
pub const ENTITY_PROCESSING_UNIT: u8 = UVC_VC_ENTITY_PROCESSING_UNIT;

/// Outcome of a control-plane dispatch: either a reply payload for
/// `SEND_RESPONSE`, or a stall (negative-length sentinel) plus the error
/// code to latch on the endpoint's Request Error Code Control.
#[derive(Debug, Clone)]
pub enum Reply {
    Data(Vec<u8>),
    Stall(u8),
}

/// Handles the Request Error Code Control (entity 0). Returns the single
/// latched byte on `GET_CUR`, stalls otherwise.
pub fn request_error_code(ctrl: &UsbCtrl, latched: u8) -> Reply {
    if ctrl.selector() != UVC_VC_REQUEST_ERROR_CODE_CONTROL || ctrl.b_request != UVC_GET_CUR {
        return Reply::Stall(UVC_ERR_INVALID_REQUEST);
    }
    Reply::Data(vec![latched])
}

/// Handles the Input Terminal's Auto-Exposure Mode selector. Any other
/// selector stalls with `INVALID_CONTROL`.
pub fn input_terminal(ctrl: &UsbCtrl) -> Reply {
    if ctrl.selector() != UVC_CT_AE_MODE_CONTROL {
        return Reply::Stall(UVC_ERR_INVALID_CONTROL);
    }

    match ctrl.b_request {
        UVC_GET_CUR | UVC_GET_RES | UVC_GET_DEF => Reply::Data(vec![0x02]),
        UVC_GET_INFO => Reply::Data(vec![UVC_CONTROL_CAP_DEVICE_CONTROLLED]),
        _ => Reply::Stall(UVC_ERR_INVALID_REQUEST),
    }
}

/// Handles the Processing Unit's Brightness selector. `SET_CUR` and
/// everything else stalls with `INVALID_REQUEST`.
pub fn processing_unit(ctrl: &UsbCtrl) -> Reply {
    if ctrl.selector() != UVC_PU_BRIGHTNESS_CONTROL {
        return Reply::Stall(UVC_ERR_INVALID_CONTROL);
    }

    match ctrl.b_request {
        UVC_GET_MIN => Reply::Data(vec![0, 0]),
        UVC_GET_MAX => Reply::Data(255u16.to_le_bytes().to_vec()),
        UVC_GET_CUR | UVC_GET_DEF => Reply::Data(127u16.to_le_bytes().to_vec()),
        UVC_GET_RES => Reply::Data(vec![1, 0]),
        UVC_GET_INFO => Reply::Data(vec![UVC_CONTROL_CAP_DEVICE_CONTROLLED]),
        _ => Reply::Stall(UVC_ERR_INVALID_REQUEST),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctrl(selector: u8, request: u8) -> UsbCtrl {
        UsbCtrl {
            b_request_type: 0xa1,
            b_request: request,
            w_value: (selector as u16) << 8,
            w_index: (ENTITY_PROCESSING_UNIT as u16) << 8,
            w_length: 2,
        }
    }

    #[test]
    fn brightness_defaults_to_127() {
        match processing_unit(&ctrl(UVC_PU_BRIGHTNESS_CONTROL, UVC_GET_CUR)) {
            Reply::Data(bytes) => assert_eq!(bytes, 127u16.to_le_bytes().to_vec()),
            Reply::Stall(_) => panic!("expected data reply"),
        }
    }

    #[test]
    fn unsupported_selector_stalls_invalid_control() {
        match processing_unit(&ctrl(0xFF, UVC_GET_CUR)) {
            Reply::Stall(code) => assert_eq!(code, UVC_ERR_INVALID_CONTROL),
            Reply::Data(_) => panic!("expected stall"),
        }
    }

    #[test]
    fn brightness_set_cur_stalls() {
        match processing_unit(&ctrl(UVC_PU_BRIGHTNESS_CONTROL, UVC_SET_CUR)) {
            Reply::Stall(code) => assert_eq!(code, UVC_ERR_INVALID_REQUEST),
            Reply::Data(_) => panic!("expected stall"),
        }
    }
}
