//! The bit-exact UVC streaming-control structure exchanged during Probe and
//! Commit (UVC 1.1 §4.3.1.1), plus the per-endpoint Probe/Commit state.
//!
//! Grounded on `original_source/.../uvc_impl.h`'s `struct uvc_streaming_control`
//! and the Probe/Commit handling in `uvc_impl.c`.

use crate::format::catalog::{Catalog, Selection, CATALOG};
use crate::sys::usb_video::{UVC_ISOC_MAX_PACKET_SIZE, UVC_STREAM_FID_EOF_REQUIRED};

pub const STREAMING_CONTROL_SIZE: usize = 34;

/// The UVC 1.1 streaming-control structure, packed to its bit-exact wire
/// layout (no compiler-inserted padding).
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamingControl {
    pub bm_hint: u16,
    pub b_format_index: u8,
    pub b_frame_index: u8,
    pub dw_frame_interval: u32,
    pub w_key_frame_rate: u16,
    pub w_p_frame_rate: u16,
    pub w_comp_quality: u16,
    pub w_comp_window_size: u16,
    pub w_delay: u16,
    pub dw_max_video_frame_size: u32,
    pub dw_max_payload_transfer_size: u32,
    pub dw_clock_frequency: u32,
    pub bm_framing_info: u8,
    pub b_prefered_version: u8,
    pub b_min_version: u8,
    pub b_max_version: u8,
}

const _: () = assert!(std::mem::size_of::<StreamingControl>() == STREAMING_CONTROL_SIZE);

impl StreamingControl {
    pub fn as_bytes(&self) -> [u8; STREAMING_CONTROL_SIZE] {
        unsafe { std::mem::transmute(*self) }
    }

    pub fn from_bytes(bytes: &[u8]) -> StreamingControl {
        let mut buf = [0u8; STREAMING_CONTROL_SIZE];
        let n = bytes.len().min(STREAMING_CONTROL_SIZE);
        buf[..n].copy_from_slice(&bytes[..n]);
        unsafe { std::mem::transmute(buf) }
    }

    /// Builds the streaming-control snapshot for a given (format, frame,
    /// interval) selection triple, as used by `GET_CUR`/`GET_MIN`/`GET_MAX`/
    /// `GET_DEF`.
    pub fn for_selection(catalog: &Catalog, format: usize, frame: usize, interval: usize) -> Self {
        let max_size = catalog.max_frame_size(format, frame);
        let dw_frame_interval = catalog.interval(format, frame, interval).unwrap_or(0);

        StreamingControl {
            bm_hint: 1,
            // wire convention: 1-based
            b_format_index: (format + 1) as u8,
            b_frame_index: (frame + 1) as u8,
            dw_frame_interval,
            w_key_frame_rate: 0,
            w_p_frame_rate: 0,
            w_comp_quality: 0,
            w_comp_window_size: 0,
            w_delay: 200,
            dw_max_video_frame_size: max_size,
            dw_max_payload_transfer_size: UVC_ISOC_MAX_PACKET_SIZE,
            dw_clock_frequency: 0,
            bm_framing_info: UVC_STREAM_FID_EOF_REQUIRED,
            b_prefered_version: 1,
            b_min_version: 1,
            b_max_version: 1,
        }
    }

    pub fn minimum(catalog: &Catalog) -> Self {
        Self::for_selection(catalog, 0, 0, 0)
    }

    pub fn maximum(catalog: &Catalog) -> Self {
        let last_format = catalog.count_formats().saturating_sub(1);
        Self::for_selection(
            catalog,
            last_format,
            catalog.max_frame_count().saturating_sub(1),
            catalog.max_interval_count().saturating_sub(1),
        )
    }

    pub fn default_for(catalog: &Catalog, default: (usize, usize, usize)) -> Self {
        Self::for_selection(catalog, default.0, default.1, default.2)
    }
}

/// Which of the two per-endpoint copies `SET_CUR`/`GET_CUR` is currently
/// addressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Probe,
    Commit,
}

/// Per-endpoint Probe/Commit state: two copies of the streaming control plus
/// a "current" pointer that starts unset (`None`) until the host's first
/// `SET_CUR`.
#[derive(Debug, Default)]
pub struct StreamingState {
    pub probe: StreamingControl,
    pub commit: StreamingControl,
    pub current: Option<Target>,
    pub selection: Selection,
    pub default_selection: (usize, usize, usize),
    /// Set by `SET_CUR`; the byte length of the DATA-phase payload the
    /// control plane is waiting for.
    pub expected_len: Option<usize>,
}

impl StreamingState {
    pub fn new() -> Self {
        StreamingState {
            default_selection: (0, 0, 0),
            ..Default::default()
        }
    }

    pub fn current_mut(&mut self) -> Option<&mut StreamingControl> {
        match self.current {
            Some(Target::Probe) => Some(&mut self.probe),
            Some(Target::Commit) => Some(&mut self.commit),
            None => None,
        }
    }

    pub fn current(&self) -> Option<&StreamingControl> {
        match self.current {
            Some(Target::Probe) => Some(&self.probe),
            Some(Target::Commit) => Some(&self.commit),
            None => None,
        }
    }

    pub fn set_cur_target(&mut self, target: Target) {
        self.current = Some(target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn struct_is_bit_exact() {
        assert_eq!(std::mem::size_of::<StreamingControl>(), 34);
    }

    #[test]
    fn literal_scenario_nv12_1080p() {
        // Scenario 1 in the spec: dwMaxVideoFrameSize = 1920*1080*3/2, dwMaxPayloadTransferSize = 1024.
        let sc = StreamingControl::for_selection(&CATALOG, 0, 0, 0);
        let (max_size, max_payload) = (sc.dw_max_video_frame_size, sc.dw_max_payload_transfer_size);
        assert_eq!(max_size, 1920 * 1080 * 3 / 2);
        assert_eq!(max_payload, 1024);
    }

    #[test]
    fn byte_roundtrip_is_lossless() {
        let sc = StreamingControl::for_selection(&CATALOG, 1, 0, 2);
        let bytes = sc.as_bytes();
        assert_eq!(StreamingControl::from_bytes(&bytes), sc);
    }
}
