//! Structured error types for the gadget controller.
//!
//! Protocol violations by the host, transient `EAGAIN` kernel busy, and proxy
//! I/O drops are *not* represented here — per the error-handling design they
//! are expected, continue-on outcomes folded into in-band result values
//! (`Outcome`, stall replies, drop counters), not `Result::Err`.

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UvcError {
    #[error("failed to open gadget device {path}: {source}")]
    Open { path: String, source: io::Error },

    #[error("{path} does not report V4L2_CAP_VIDEO_OUTPUT")]
    NotVideoOutput { path: String },

    #[error("ioctl {name} failed on {path}: {source}")]
    Ioctl {
        path: String,
        name: &'static str,
        source: io::Error,
    },

    #[error("mmap of buffer {index} failed: {source}")]
    Mmap { index: usize, source: io::Error },

    #[error("spawning the device event thread failed: {source}")]
    ThreadSpawn { source: io::Error },

    #[error("too many device paths: {count} exceeds the maximum of {max}")]
    TooManyPaths { count: usize, max: usize },

    #[error("UVC_DEVICE is not set")]
    MissingEnv,

    #[error("proxy connection I/O failed: {source}")]
    ProxyIo { source: io::Error },

    #[error("proxy protocol violation: {reason}")]
    ProxyProtocol { reason: &'static str },
}

pub type Result<T> = std::result::Result<T, UvcError>;
