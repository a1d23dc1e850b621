//! V4L2 MMAP buffer pool for the gadget's video-output queue.

pub mod pool;

pub use pool::{BufferHandle, BufferPool};
