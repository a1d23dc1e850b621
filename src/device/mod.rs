//! `Device`: owns the gadget character device fds, spawns the background
//! task, and wires the event decoder into the control and data planes
//! under a single per-device mutex.
//!
//! Grounded on `original_source/.../uvc.c`'s `uvc_device_create` /
//! `uvc_device_destroy` and the teacher's `src/device.rs` (fd + config
//! ownership, `Drop` closing the fd).

pub mod task;

use std::env;
use std::ffi::OsString;
use std::os::unix::io::RawFd;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, TryLockError};

use crate::buffer::BufferPool;
use crate::control::{send_response, ControlPlane};
use crate::data::{handle_data, DataPlaneStats, FrameSource};
use crate::error::{Result, UvcError};
use crate::event::{self, Event};
use crate::format::catalog::CATALOG;
use crate::sys::ioctl;
use crate::sys::v4l2_abi::{
    v4l2_capability, v4l2_event_subscription, V4L2_CAP_VIDEO_OUTPUT, V4L2_EVENT_ALL,
};
use crate::v4l2;
use task::{Admission, EventHandler, State, Task};

const MAX_PATHS: usize = 32;
const BUFFER_SLOTS: u32 = 4;

/// Explicit configuration for a gadget device: the character device paths to
/// open (one per streaming endpoint) and an optional debugfs-style path kept
/// for parity with the original's diagnostic hook.
#[derive(Debug, Clone, Default)]
pub struct DeviceConfig {
    pub paths: Vec<PathBuf>,
    pub dbg_path: Option<PathBuf>,
}

impl DeviceConfig {
    pub fn new(paths: Vec<PathBuf>) -> Result<Self> {
        if paths.len() > MAX_PATHS {
            return Err(UvcError::TooManyPaths {
                count: paths.len(),
                max: MAX_PATHS,
            });
        }
        Ok(DeviceConfig {
            paths,
            dbg_path: None,
        })
    }

    /// Parity helper for the original's comma-separated `UVC_DEVICE`
    /// environment variable.
    pub fn from_env(var: &str) -> Result<Self> {
        let value: OsString = env::var_os(var).ok_or(UvcError::MissingEnv)?;
        let paths: Vec<PathBuf> = value
            .to_string_lossy()
            .split(',')
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .collect();
        Self::new(paths)
    }
}

/// `sink_data` call accounting, per the data model's "counts of delivered,
/// busy-dropped, explicitly dropped frames". Lives outside the endpoint
/// mutex since the busy and reject paths never acquire it.
#[derive(Debug, Default)]
struct SinkStats {
    data_no: AtomicU64,
    busy_no: AtomicU64,
    drop_no: AtomicU64,
}

/// A point-in-time snapshot of [`SinkStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkStatsSnapshot {
    pub sink_data_no: u64,
    pub sink_busy_no: u64,
    pub sink_drop_no: u64,
}

impl SinkStats {
    fn snapshot(&self) -> SinkStatsSnapshot {
        SinkStatsSnapshot {
            sink_data_no: self.data_no.load(Ordering::Relaxed),
            sink_busy_no: self.busy_no.load(Ordering::Relaxed),
            sink_drop_no: self.drop_no.load(Ordering::Relaxed),
        }
    }
}

struct Endpoint {
    fd: RawFd,
    control: ControlPlane,
    pool: Option<BufferPool>,
    stats: DataPlaneStats,
}

struct Inner {
    endpoints: Vec<Endpoint>,
}

impl Inner {
    fn handle_events(&mut self, endpoint: usize) {
        let ep = match self.endpoints.get_mut(endpoint) {
            Some(ep) => ep,
            None => return,
        };

        let decoded = match event::dequeue(ep.fd) {
            Ok(event) => event,
            Err(err) => {
                log::warn!("dequeue failed on endpoint {endpoint}: {err}");
                return;
            }
        };

        match decoded {
            Event::Connect => log::debug!("endpoint {endpoint}: CONNECT"),
            Event::Disconnect => log::debug!("endpoint {endpoint}: DISCONNECT"),
            Event::StreamOn => {
                log::debug!("endpoint {endpoint}: STREAMON");
                match BufferPool::acquire(ep.fd, BUFFER_SLOTS) {
                    Ok(pool) => ep.pool = Some(pool),
                    Err(err) => log::error!("buffer pool acquire failed: {err}"),
                }
            }
            Event::StreamOff => {
                log::debug!("endpoint {endpoint}: STREAMOFF");
                if let Some(pool) = ep.pool.take() {
                    if let Err(err) = pool.release() {
                        log::warn!("buffer pool release failed: {err}");
                    }
                }
            }
            Event::Setup(ctrl) => {
                let reply = ep.control.handle_setup(&ctrl, endpoint);
                if let Err(err) = send_response(ep.fd, &reply) {
                    log::warn!("SEND_RESPONSE failed on endpoint {endpoint}: {err}");
                }
            }
            Event::Data(payload) => {
                ep.control.handle_data(&payload);
                if let Err(err) = ep.control.program_format(ep.fd) {
                    log::warn!("S_FMT failed on endpoint {endpoint}: {err}");
                }
            }
        }
    }
}

struct Dispatch(Mutex<Inner>);

impl EventHandler for Dispatch {
    fn handle_events(&self, endpoint: usize) {
        let mut inner = self.0.lock().unwrap();
        inner.handle_events(endpoint);
    }
}

/// A UVC gadget device spanning one or more video-output character devices.
pub struct Device {
    dispatch: Arc<Dispatch>,
    task: Task,
    sink: SinkStats,
}

impl Device {
    pub fn create(config: DeviceConfig) -> Result<Device> {
        let mut endpoints = Vec::with_capacity(config.paths.len());
        let mut fds = Vec::with_capacity(config.paths.len());

        for path in &config.paths {
            let fd = open_and_verify(path)?;
            subscribe_all(fd, path)?;
            fds.push(fd);
            endpoints.push(Endpoint {
                fd,
                control: ControlPlane::new(),
                pool: None,
                stats: DataPlaneStats::default(),
            });
        }

        let dispatch = Arc::new(Dispatch(Mutex::new(Inner { endpoints })));
        let task = Task::spawn(fds, Arc::clone(&dispatch))?;

        Ok(Device {
            dispatch,
            task,
            sink: SinkStats::default(),
        })
    }

    pub fn state(&self) -> State {
        self.task.state()
    }

    /// Snapshot of `sink_data` call accounting: `sink_data_no` observes
    /// every call; `sink_busy_no` is the subset dropped for mutex
    /// contention; `sink_drop_no` is every call that did not deliver a
    /// frame (including busy ones).
    pub fn sink_stats(&self) -> SinkStatsSnapshot {
        self.sink.snapshot()
    }

    /// Producer-facing frame submission. Never blocks: contends the mutex
    /// with `try_lock` and drops on contention or non-`Started` state.
    pub fn sink_data(&self, endpoint: usize, frame: &dyn FrameSource) -> i32 {
        self.sink.data_no.fetch_add(1, Ordering::Relaxed);

        match task::admit(self.task.state()) {
            Admission::Reject => {
                self.sink.drop_no.fetch_add(1, Ordering::Relaxed);
                return -1;
            }
            Admission::SoftBusy => {
                self.sink.drop_no.fetch_add(1, Ordering::Relaxed);
                return 0;
            }
            Admission::Proceed => {}
        }

        let mut inner = match self.dispatch.0.try_lock() {
            Ok(inner) => inner,
            Err(TryLockError::WouldBlock) => {
                self.sink.busy_no.fetch_add(1, Ordering::Relaxed);
                self.sink.drop_no.fetch_add(1, Ordering::Relaxed);
                return 0;
            }
            Err(TryLockError::Poisoned(_)) => {
                self.sink.drop_no.fetch_add(1, Ordering::Relaxed);
                return -1;
            }
        };

        let ep = match inner.endpoints.get_mut(endpoint) {
            Some(ep) => ep,
            None => {
                self.sink.drop_no.fetch_add(1, Ordering::Relaxed);
                return -1;
            }
        };

        let format = ep.control.resolved_format();
        let frame_idx = ep.control.resolved_frame();
        let outcome = handle_data(ep.pool.as_ref(), &CATALOG, format, frame_idx, &mut ep.stats, frame);
        if !matches!(outcome, crate::data::Outcome::Accepted) {
            self.sink.drop_no.fetch_add(1, Ordering::Relaxed);
        }
        i32::from(&outcome)
    }

    /// Unsubscribes events, joins the task, releases buffer pools, and
    /// closes every fd in reverse order of acquisition.
    pub fn destroy(mut self) {
        self.task.join();

        let mut inner = self.dispatch.0.lock().unwrap();
        for ep in inner.endpoints.iter_mut().rev() {
            let mut sub = v4l2_event_subscription {
                type_: V4L2_EVENT_ALL,
                ..Default::default()
            };
            unsafe {
                let _ = v4l2::ioctl(
                    ep.fd,
                    ioctl::VIDIOC_UNSUBSCRIBE_EVENT,
                    &mut sub as *mut _ as *mut std::os::raw::c_void,
                );
            }
            if let Some(pool) = ep.pool.take() {
                let _ = pool.release();
            }
            let _ = v4l2::close(ep.fd);
        }
    }
}

fn open_and_verify(path: &Path) -> Result<RawFd> {
    let fd = v4l2::open(path, libc::O_RDWR).map_err(|source| UvcError::Open {
        path: path.display().to_string(),
        source,
    })?;

    let mut cap = v4l2_capability::default();
    let queried = unsafe {
        v4l2::ioctl(
            fd,
            ioctl::VIDIOC_QUERYCAP,
            &mut cap as *mut _ as *mut std::os::raw::c_void,
        )
    };
    if let Err(source) = queried {
        let _ = v4l2::close(fd);
        return Err(UvcError::Ioctl {
            path: path.display().to_string(),
            name: "VIDIOC_QUERYCAP",
            source,
        });
    }

    if cap.device_caps & V4L2_CAP_VIDEO_OUTPUT == 0 && cap.capabilities & V4L2_CAP_VIDEO_OUTPUT == 0
    {
        let _ = v4l2::close(fd);
        return Err(UvcError::NotVideoOutput {
            path: path.display().to_string(),
        });
    }

    Ok(fd)
}

const SUBSCRIBED_EVENTS: &[u32] = &[
    crate::sys::v4l2_abi::UVC_EVENT_CONNECT,
    crate::sys::v4l2_abi::UVC_EVENT_DISCONNECT,
    crate::sys::v4l2_abi::UVC_EVENT_STREAMON,
    crate::sys::v4l2_abi::UVC_EVENT_STREAMOFF,
    crate::sys::v4l2_abi::UVC_EVENT_SETUP,
    crate::sys::v4l2_abi::UVC_EVENT_DATA,
];

fn subscribe_all(fd: RawFd, path: &Path) -> Result<()> {
    for &ty in SUBSCRIBED_EVENTS {
        let mut sub = v4l2_event_subscription {
            type_: ty,
            ..Default::default()
        };
        unsafe {
            v4l2::ioctl(
                fd,
                ioctl::VIDIOC_SUBSCRIBE_EVENT,
                &mut sub as *mut _ as *mut std::os::raw::c_void,
            )
        }
        .map_err(|source| UvcError::Ioctl {
            path: path.display().to_string(),
            name: "VIDIOC_SUBSCRIBE_EVENT",
            source,
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_rejects_too_many_paths() {
        let paths: Vec<PathBuf> = (0..40).map(|i| PathBuf::from(format!("/dev/video{i}"))).collect();
        assert!(matches!(
            DeviceConfig::new(paths),
            Err(UvcError::TooManyPaths { count: 40, max: 32 })
        ));
    }

    #[test]
    fn config_from_env_splits_comma_list() {
        std::env::set_var("UVC_GADGET_TEST_DEVICES", "/dev/video0,/dev/video1");
        let config = DeviceConfig::from_env("UVC_GADGET_TEST_DEVICES").unwrap();
        assert_eq!(
            config.paths,
            vec![PathBuf::from("/dev/video0"), PathBuf::from("/dev/video1")]
        );
        std::env::remove_var("UVC_GADGET_TEST_DEVICES");
    }

    #[test]
    fn config_from_env_missing_errors() {
        std::env::remove_var("UVC_GADGET_TEST_DEVICES_MISSING");
        assert!(matches!(
            DeviceConfig::from_env("UVC_GADGET_TEST_DEVICES_MISSING"),
            Err(UvcError::MissingEnv)
        ));
    }

    #[test]
    fn sink_stats_busy_drop_satisfies_invariant() {
        let sink = SinkStats::default();
        sink.data_no.fetch_add(1, Ordering::Relaxed);
        sink.busy_no.fetch_add(1, Ordering::Relaxed);
        sink.drop_no.fetch_add(1, Ordering::Relaxed);

        let snapshot = sink.snapshot();
        assert_eq!(snapshot.sink_data_no, 1);
        assert_eq!(snapshot.sink_busy_no, 1);
        assert_eq!(snapshot.sink_drop_no, 1);
    }
}
