//! USB and UVC protocol constants (USB 9.3, UVC 1.1 class requests).

/// `bRequestType` direction/type/recipient masks (USB 9.3).
pub const USB_DIR_MASK: u8 = 0x80;
pub const USB_DIR_IN: u8 = 0x80;
pub const USB_TYPE_MASK: u8 = 0x60;
pub const USB_TYPE_STANDARD: u8 = 0x00;
pub const USB_TYPE_CLASS: u8 = 0x20;
pub const USB_TYPE_VENDOR: u8 = 0x40;
pub const USB_RECIP_MASK: u8 = 0x1f;
pub const USB_RECIP_INTERFACE: u8 = 0x01;

/// UVC class-specific requests (UVC 1.1 Table 4-44).
pub const UVC_SET_CUR: u8 = 0x01;
pub const UVC_GET_CUR: u8 = 0x81;
pub const UVC_GET_MIN: u8 = 0x82;
pub const UVC_GET_MAX: u8 = 0x83;
pub const UVC_GET_RES: u8 = 0x84;
pub const UVC_GET_LEN: u8 = 0x85;
pub const UVC_GET_INFO: u8 = 0x86;
pub const UVC_GET_DEF: u8 = 0x87;

/// Video Control interface entity/selector identifiers.
pub const UVC_VC_ENTITY_DEVICE: u8 = 0x00;
pub const UVC_VC_ENTITY_INPUT_TERMINAL: u8 = 0x01;
pub const UVC_VC_ENTITY_PROCESSING_UNIT: u8 = 0x02;

pub const UVC_VC_REQUEST_ERROR_CODE_CONTROL: u8 = 0x02;
pub const UVC_CT_AE_MODE_CONTROL: u8 = 0x02;
pub const UVC_PU_BRIGHTNESS_CONTROL: u8 = 0x02;

/// Video Streaming interface selectors.
pub const UVC_VS_PROBE_CONTROL: u8 = 0x01;
pub const UVC_VS_COMMIT_CONTROL: u8 = 0x02;
pub const UVC_STREAM_ERROR_CODE_CONTROL: u8 = 0x03;

/// Request Error Code Control values (UVC 1.1 Table 4-46).
pub const UVC_ERR_NO_ERROR: u8 = 0x00;
pub const UVC_ERR_INVALID_REQUEST: u8 = 0x07;
pub const UVC_ERR_INVALID_CONTROL: u8 = 0x06;

/// `GET_INFO` capability bits.
pub const UVC_CONTROL_CAP_GET: u8 = 0x01;
pub const UVC_CONTROL_CAP_SET: u8 = 0x02;
pub const UVC_CONTROL_CAP_DEVICE_CONTROLLED: u8 = 0x04;

/// Signals a USB protocol stall when handed to `UVCIOC_SEND_RESPONSE` as the
/// reply length (Linux `errno.h`: `EL2HLT` = "Level 2 halted").
pub const EL2HLT: i32 = 51;

/// `bmFramingInfo`: frame-id and end-of-frame bits required by §2.4.3.3.
pub const UVC_STREAM_FID_EOF_REQUIRED: u8 = 0x03;

/// USB isochronous max packet size at High Speed / Super Speed.
pub const UVC_ISOC_MAX_PACKET_SIZE: u32 = 1024;
