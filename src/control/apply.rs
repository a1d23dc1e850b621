//! The coercion policy applied when the host commits a streaming control
//! (spec: Apply Streaming Control) and the V4L2 format programming that
//! follows it.
//!
//! Grounded on `original_source/.../uvc_impl.c`'s `uvc_events_process_data`
//! negotiation-field handling.

use std::os::raw::c_int;

use crate::control::streaming::StreamingControl;
use crate::format::catalog::Catalog;
use crate::sys::ioctl;
use crate::sys::v4l2_abi::{v4l2_format, V4L2_BUF_TYPE_VIDEO_OUTPUT};
use crate::v4l2;

/// A resolved (format, frame, interval) triple, distinct from the catalog's
/// `Option`-wrapped `Selection` which also models "nothing negotiated yet".
pub type Resolved = (usize, usize, usize);

/// Coerces `desired` in place against `current`, using `catalog` to validate
/// and recompute format-dependent fields. Returns the (possibly updated)
/// selection triple.
pub fn apply_streaming_control(
    catalog: &Catalog,
    current: &mut StreamingControl,
    desired: &StreamingControl,
    selection: Resolved,
) -> Resolved {
    let (mut format, mut frame, mut interval) = selection;

    if desired.b_format_index != 0 {
        let format_idx = (desired.b_format_index - 1) as usize;
        if format_idx < catalog.count_formats() {
            current.b_format_index = desired.b_format_index;
            format = format_idx;
        }
    }

    if desired.b_frame_index != 0 {
        let frame_idx = (desired.b_frame_index - 1) as usize;
        if frame_idx < catalog.count_frames(format) {
            current.b_frame_index = desired.b_frame_index;
            frame = frame_idx;
        }
    }

    if let Some(idx) = exact_interval_index(catalog, format, frame, desired.dw_frame_interval) {
        current.dw_frame_interval = desired.dw_frame_interval;
        interval = idx;
    }

    copy_if_zero(&mut current.bm_hint, desired.bm_hint);
    copy_if_zero(&mut current.w_key_frame_rate, desired.w_key_frame_rate);
    copy_if_zero(&mut current.w_p_frame_rate, desired.w_p_frame_rate);
    copy_if_zero(&mut current.w_comp_quality, desired.w_comp_quality);
    copy_if_zero(&mut current.w_comp_window_size, desired.w_comp_window_size);
    copy_if_zero(&mut current.w_delay, desired.w_delay);
    copy_if_zero(&mut current.dw_clock_frequency, desired.dw_clock_frequency);
    copy_if_zero_u8(&mut current.bm_framing_info, desired.bm_framing_info);
    copy_if_zero_u8(&mut current.b_prefered_version, desired.b_prefered_version);
    copy_if_zero_u8(&mut current.b_min_version, desired.b_min_version);
    copy_if_zero_u8(&mut current.b_max_version, desired.b_max_version);

    if current.dw_max_video_frame_size == 0 && current.dw_max_payload_transfer_size == 0 {
        current.dw_max_video_frame_size = desired.dw_max_video_frame_size;
        current.dw_max_payload_transfer_size = desired.dw_max_payload_transfer_size;
    } else {
        current.dw_max_video_frame_size = catalog.max_frame_size(format, frame);
    }

    (format, frame, interval)
}

fn copy_if_zero(dst: &mut u16, src: u16) {
    if *dst == 0 {
        *dst = src;
    }
}

fn copy_if_zero_u8(dst: &mut u8, src: u8) {
    if *dst == 0 {
        *dst = src;
    }
}

/// Finds the catalog interval entry matching `requested` exactly. A
/// non-exact value does not promote: the caller retains the prior interval.
fn exact_interval_index(catalog: &Catalog, format: usize, frame: usize, requested: u32) -> Option<usize> {
    let count = catalog.count_intervals(format, frame);
    (0..count).find(|&i| catalog.interval(format, frame, i) == Some(requested))
}

/// Programs the V4L2 output format (`VIDIOC_S_FMT`) to match the coerced
/// selection: width, height, FourCC and `sizeimage`.
pub fn program_format(fd: c_int, catalog: &Catalog, selection: Resolved) -> std::io::Result<()> {
    let (format, frame, _) = selection;
    let desc = catalog
        .format(format)
        .expect("selection indices are only ever produced by the catalog itself");
    let frame_desc = catalog
        .frame(format, frame)
        .expect("selection indices are only ever produced by the catalog itself");

    let mut fmt = v4l2_format::default();
    fmt.type_ = V4L2_BUF_TYPE_VIDEO_OUTPUT;
    fmt.pix.width = frame_desc.width as u32;
    fmt.pix.height = frame_desc.height as u32;
    fmt.pix.pixelformat = u32::from(desc.fourcc);
    fmt.pix.sizeimage = catalog.max_frame_size(format, frame);
    fmt.pix.field = 1; // V4L2_FIELD_NONE

    unsafe {
        v4l2::ioctl(
            fd,
            ioctl::VIDIOC_S_FMT,
            &mut fmt as *mut _ as *mut std::os::raw::c_void,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::catalog::CATALOG;

    #[test]
    fn format_index_promotes_when_in_catalog() {
        let mut current = StreamingControl::for_selection(&CATALOG, 0, 0, 0);
        let mut desired = StreamingControl::for_selection(&CATALOG, 1, 0, 0);
        desired.bm_hint = 0;
        let (format, _, _) = apply_streaming_control(&CATALOG, &mut current, &desired, (0, 0, 0));
        assert_eq!(format, 1);
        assert_eq!(current.b_format_index, 2);
    }

    #[test]
    fn out_of_range_format_index_is_retained() {
        let mut current = StreamingControl::for_selection(&CATALOG, 0, 0, 0);
        let mut desired = current;
        desired.b_format_index = 200;
        let (format, _, _) = apply_streaming_control(&CATALOG, &mut current, &desired, (0, 0, 0));
        assert_eq!(format, 0);
    }

    #[test]
    fn zero_negotiation_fields_are_copied_from_desired() {
        let mut current = StreamingControl::for_selection(&CATALOG, 0, 0, 0);
        current.w_delay = 0;
        let mut desired = current;
        desired.w_delay = 77;
        apply_streaming_control(&CATALOG, &mut current, &desired, (0, 0, 0));
        assert_eq!(current.w_delay, 77);
    }

    #[test]
    fn zero_format_and_frame_index_retain_prior_selection() {
        let mut current = StreamingControl::for_selection(&CATALOG, 0, 0, 0);
        let mut desired = current;
        desired.b_format_index = 0;
        desired.b_frame_index = 0;
        let (format, frame, _) = apply_streaming_control(&CATALOG, &mut current, &desired, (0, 0, 0));
        assert_eq!(format, 0);
        assert_eq!(frame, 0);
        assert_eq!(current.b_format_index, 1);
        assert_eq!(current.b_frame_index, 1);
    }

    #[test]
    fn non_exact_interval_is_not_promoted() {
        let mut current = StreamingControl::for_selection(&CATALOG, 0, 0, 0);
        let original_interval = current.dw_frame_interval;
        let mut desired = current;
        desired.dw_frame_interval = original_interval.wrapping_add(1);
        apply_streaming_control(&CATALOG, &mut current, &desired, (0, 0, 0));
        assert_eq!(current.dw_frame_interval, original_interval);
    }
}
