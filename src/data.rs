//! The UVC Data Plane: pushes producer frames into the V4L2 MMAP buffer
//! pool, one slot per call, in strict `curr_no` order.
//!
//! Grounded on `original_source/.../uvc_impl.c`'s `uvc_video_process` and on
//! the teacher's `buffers::mmap_stream` queue/dequeue cycle.

use crate::buffer::BufferPool;
use crate::error::UvcError;
use crate::format::catalog::Catalog;

/// Stands in for the original's opaque `user_data` + `fill_buffer`/`drop`
/// callback pair. The data plane never looks inside a `FrameSource` beyond
/// this trait.
pub trait FrameSource {
    /// Copies up to `dst.len()` bytes of frame data into `dst`, returning the
    /// number of bytes actually written.
    fn fill(&self, dst: &mut [u8]) -> usize;

    /// Presentation timestamp in microseconds (`CLOCK_MONOTONIC`-equivalent).
    fn timestamp_us(&self) -> u64;
}

/// Result of one `handle_data` call; mirrors the original's `{0, 1, -1}`
/// return codes without losing the fatal error's cause.
#[derive(Debug)]
pub enum Outcome {
    Accepted,
    Dropped,
    Fatal(UvcError),
}

impl From<&Outcome> for i32 {
    fn from(outcome: &Outcome) -> Self {
        match outcome {
            Outcome::Accepted => 0,
            Outcome::Dropped => 1,
            Outcome::Fatal(_) => -1,
        }
    }
}

/// Per-endpoint data-plane bookkeeping: the running slot cursor and the
/// counters the concurrency model treats as mutex-serialized statistics.
#[derive(Debug, Default)]
pub struct DataPlaneStats {
    pub curr_no: u64,
    pub qbuf_no: u64,
    pub dqbuf_no: u64,
    pub data_no: u64,
    pub data_drop: u64,
}

/// Pushes one frame into the buffer pool. Returns `Outcome::Dropped` for
/// every transient condition (no pool, slot still queued, `EAGAIN`) so the
/// caller can retry on the next frame; only unexpected ioctl failures are
/// `Fatal`.
pub fn handle_data(
    pool: Option<&BufferPool>,
    catalog: &Catalog,
    format: usize,
    frame_idx: usize,
    stats: &mut DataPlaneStats,
    frame: &dyn FrameSource,
) -> Outcome {
    stats.data_no += 1;

    let pool = match pool {
        Some(pool) if !pool.is_empty() => pool,
        _ => {
            stats.data_drop += 1;
            return Outcome::Dropped;
        }
    };

    let index = (stats.curr_no % pool.len() as u64) as u32;

    let flags = match pool.query(index) {
        Ok(flags) => flags,
        Err(err) => return Outcome::Fatal(UvcError::Ioctl {
            path: String::new(),
            name: "VIDIOC_QUERYBUF",
            source: err,
        }),
    };

    if BufferPool::is_queued(flags) {
        stats.data_drop += 1;
        return Outcome::Dropped;
    }

    if BufferPool::is_done(flags) {
        match pool.dequeue() {
            Ok(Some(_)) => stats.dqbuf_no += 1,
            Ok(None) => {
                stats.data_drop += 1;
                return Outcome::Dropped;
            }
            Err(err) => {
                return Outcome::Fatal(UvcError::Ioctl {
                    path: String::new(),
                    name: "VIDIOC_DQBUF",
                    source: err,
                })
            }
        }
    }

    let slot = pool.slot(index as usize);
    let dst = unsafe { std::slice::from_raw_parts_mut(slot.addr, slot.size) };
    let written = frame.fill(dst);

    let bytes_used = if catalog.is_compressed(format) {
        written as u32
    } else {
        catalog.max_frame_size(format, frame_idx).max(written as u32)
    };

    let timestamp = libc::timeval {
        tv_sec: (frame.timestamp_us() / 1_000_000) as libc::time_t,
        tv_usec: (frame.timestamp_us() % 1_000_000) as libc::suseconds_t,
    };

    match pool.queue(index, bytes_used, timestamp) {
        Ok(true) => {
            stats.qbuf_no += 1;
            stats.curr_no += 1;
            Outcome::Accepted
        }
        Ok(false) => {
            stats.data_drop += 1;
            Outcome::Dropped
        }
        Err(err) => Outcome::Fatal(UvcError::Ioctl {
            path: String::new(),
            name: "VIDIOC_QBUF",
            source: err,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ConstFrame(u8);

    impl FrameSource for ConstFrame {
        fn fill(&self, dst: &mut [u8]) -> usize {
            for b in dst.iter_mut() {
                *b = self.0;
            }
            dst.len()
        }

        fn timestamp_us(&self) -> u64 {
            123_456
        }
    }

    #[test]
    fn no_pool_allocated_drops_and_counts() {
        let mut stats = DataPlaneStats::default();
        let frame = ConstFrame(0xAB);
        let outcome = handle_data(None, &crate::format::catalog::CATALOG, 0, 0, &mut stats, &frame);
        assert!(matches!(outcome, Outcome::Dropped));
        assert_eq!(stats.data_no, 1);
        assert_eq!(stats.data_drop, 1);
    }

    #[test]
    fn outcome_maps_to_original_return_codes() {
        assert_eq!(i32::from(&Outcome::Accepted), 0);
        assert_eq!(i32::from(&Outcome::Dropped), 1);
        assert_eq!(
            i32::from(&Outcome::Fatal(UvcError::ProxyIo {
                source: std::io::Error::new(std::io::ErrorKind::Other, "x"),
            })),
            -1
        );
    }
}
