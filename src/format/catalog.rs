//! Static format/frame/interval table.
//!
//! Grounded on `uvc_format_info_t` / `uvc_frame_info_t` / `uvc_frame_intervals_t`
//! in the original implementation's `uvc_impl.h`: a format owns an ordered
//! list of frame sizes, each of which shares one interval list. Indices here
//! are 0-based; the UVC wire convention (1-based `bFormatIndex`/`bFrameIndex`)
//! is applied only at the control-plane boundary.

use super::FourCC;

/// Frame intervals in 100 ns units, shared by every frame size in this
/// catalog (1, 5, 10, 15, 20, 25, 30 fps).
pub const INTERVALS: &[u32] = &[
    10_000_000 / 1,
    10_000_000 / 5,
    10_000_000 / 10,
    10_000_000 / 15,
    10_000_000 / 20,
    10_000_000 / 25,
    10_000_000 / 30,
];

#[derive(Debug, Clone, Copy)]
pub struct FrameDescriptor {
    pub width: u16,
    pub height: u16,
    pub intervals: &'static [u32],
}

#[derive(Debug, Clone, Copy)]
pub struct FormatDescriptor {
    pub name: &'static str,
    pub fourcc: FourCC,
    pub compressed: bool,
    pub frames: &'static [FrameDescriptor],
}

const FRAMES_1080P: &[FrameDescriptor] = &[FrameDescriptor {
    width: 1920,
    height: 1080,
    intervals: INTERVALS,
}];

pub const CATALOG: Catalog = Catalog {
    formats: &[
        FormatDescriptor {
            name: "NV12",
            fourcc: FourCC::new(b"NV12"),
            compressed: false,
            frames: FRAMES_1080P,
        },
        FormatDescriptor {
            name: "YUYV",
            fourcc: FourCC::new(b"YUYV"),
            compressed: false,
            frames: FRAMES_1080P,
        },
        FormatDescriptor {
            name: "MJPEG",
            fourcc: FourCC::new(b"MJPG"),
            compressed: true,
            frames: FRAMES_1080P,
        },
    ],
};

/// A 0-based (format, frame, interval) triple. `None` before the host's
/// first `SET_CUR`.
pub type Selection = Option<(usize, usize, usize)>;

pub struct Catalog {
    pub formats: &'static [FormatDescriptor],
}

impl Catalog {
    pub fn count_formats(&self) -> usize {
        self.formats.len()
    }

    pub fn count_frames(&self, format: usize) -> usize {
        self.formats.get(format).map_or(0, |f| f.frames.len())
    }

    pub fn count_intervals(&self, format: usize, frame: usize) -> usize {
        self.formats
            .get(format)
            .and_then(|f| f.frames.get(frame))
            .map_or(0, |fr| fr.intervals.len())
    }

    pub fn format(&self, format: usize) -> Option<&'static FormatDescriptor> {
        self.formats.get(format)
    }

    pub fn frame(&self, format: usize, frame: usize) -> Option<&'static FrameDescriptor> {
        self.format(format).and_then(|f| f.frames.get(frame))
    }

    pub fn interval(&self, format: usize, frame: usize, interval: usize) -> Option<u32> {
        self.frame(format, frame)
            .and_then(|fr| fr.intervals.get(interval))
            .copied()
    }

    /// Maximum frame buffer size in bytes for the given (format, frame).
    ///
    /// YUYV: `W*H*2`. NV12: `W*H*3/2` (a Y plane of `W*H` plus a half-size
    /// interleaved chroma plane). MJPEG: `W*H`, a pessimistic upper bound
    /// since compressed size is payload-dependent. Unknown indices return 0.
    pub fn max_frame_size(&self, format: usize, frame: usize) -> u32 {
        let (desc, fr) = match (self.format(format), self.frame(format, frame)) {
            (Some(d), Some(f)) => (d, f),
            _ => {
                log::error!("max_frame_size: out of range format={format} frame={frame}");
                return 0;
            }
        };

        let w = fr.width as u32;
        let h = fr.height as u32;
        match desc.fourcc.str() {
            Ok("YUYV") => w * h * 2,
            Ok("NV12") => w * h + (w * h >> 1),
            Ok("MJPG") => w * h,
            _ => {
                log::error!("max_frame_size: unknown fourcc for format {format}");
                0
            }
        }
    }

    pub fn is_compressed(&self, format: usize) -> bool {
        self.format(format).map_or(false, |f| f.compressed)
    }

    /// Greatest frame count across any format (used by `GET_MAX`).
    pub fn max_frame_count(&self) -> usize {
        self.formats.iter().map(|f| f.frames.len()).max().unwrap_or(0)
    }

    /// Greatest interval count across any frame of any format (used by `GET_MAX`).
    pub fn max_interval_count(&self) -> usize {
        self.formats
            .iter()
            .flat_map(|f| f.frames.iter())
            .map(|fr| fr.intervals.len())
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computes_literal_frame_sizes_from_the_spec() {
        assert_eq!(CATALOG.max_frame_size(0, 0), 1920 * 1080 * 3 / 2); // NV12
        assert_eq!(CATALOG.max_frame_size(1, 0), 1920 * 1080 * 2); // YUYV
        assert_eq!(CATALOG.max_frame_size(2, 0), 1920 * 1080); // MJPEG
    }

    #[test]
    fn only_mjpeg_is_compressed() {
        assert!(!CATALOG.is_compressed(0));
        assert!(!CATALOG.is_compressed(1));
        assert!(CATALOG.is_compressed(2));
    }

    #[test]
    fn bounds_are_symmetric_across_formats() {
        assert_eq!(CATALOG.count_formats(), 3);
        assert_eq!(CATALOG.max_frame_count(), 1);
        assert_eq!(CATALOG.max_interval_count(), INTERVALS.len());
    }

    #[test]
    fn out_of_range_lookups_return_zero_not_panic() {
        assert_eq!(CATALOG.max_frame_size(99, 0), 0);
        assert_eq!(CATALOG.count_frames(99), 0);
    }
}
