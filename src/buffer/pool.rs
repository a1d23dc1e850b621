//! The V4L2 MMAP buffer pool: `REQBUFS`/`QUERYBUF`/`mmap` on acquire,
//! `munmap`/`REQBUFS(count=0)` on release, and thin `QBUF`/`DQBUF`/`QUERYBUF`
//! wrappers for the data plane.
//!
//! Grounded on the teacher's `buffers::mmap_manager::MappedBufferManager`
//! (`allocate`/`release`/`queue`/`dequeue` over `VIDIOC_REQBUFS` →
//! `VIDIOC_QUERYBUF` → `mmap`) and on `original_source/.../v4l2.c`
//! (`map_bufs`/`unmap_bufs`/`acquire_bufs_mmap`/`release_bufs_mmap`).

use std::os::raw::c_int;
use std::{io, mem};

use crate::error::{Result, UvcError};
use crate::sys::ioctl;
use crate::sys::v4l2_abi::{
    v4l2_buffer, v4l2_requestbuffers, V4L2_BUF_FLAG_DONE, V4L2_BUF_FLAG_QUEUED,
    V4L2_BUF_TYPE_VIDEO_OUTPUT, V4L2_MEMORY_MMAP,
};
use crate::v4l2;

/// One mapped kernel buffer. The address is valid between `acquire` and
/// `release`; the kernel owns the contents between `queue` and `dequeue`.
#[derive(Debug)]
pub struct BufferHandle {
    pub addr: *mut u8,
    pub size: usize,
}

// The pool is the sole owner of each mapped region; handing out &mut access
// through `&self` (a fixed fd + index) rather than `&mut BufferHandle` keeps
// the pool itself `Send` without claiming `Sync` semantics it doesn't have.
unsafe impl Send for BufferHandle {}

pub struct BufferPool {
    fd: c_int,
    handles: Vec<BufferHandle>,
}

fn zeroed_reqbufs(count: u32) -> v4l2_requestbuffers {
    let mut r: v4l2_requestbuffers = unsafe { mem::zeroed() };
    r.count = count;
    r.type_ = V4L2_BUF_TYPE_VIDEO_OUTPUT;
    r.memory = V4L2_MEMORY_MMAP;
    r
}

fn zeroed_buffer(index: u32) -> v4l2_buffer {
    let mut b = v4l2_buffer::default();
    b.type_ = V4L2_BUF_TYPE_VIDEO_OUTPUT;
    b.memory = V4L2_MEMORY_MMAP;
    b.index = index;
    b
}

impl BufferPool {
    /// Requests `requested` MMAP buffers from `fd`, maps each one, and
    /// returns the pool. If the kernel grants fewer buffers than requested,
    /// the actual count is used and a diagnostic is logged. Any mapping
    /// failure unwinds all buffers already mapped and releases the request.
    pub fn acquire(fd: c_int, requested: u32) -> Result<BufferPool> {
        let mut reqbufs = zeroed_reqbufs(requested);
        unsafe {
            v4l2::ioctl(
                fd,
                ioctl::VIDIOC_REQBUFS,
                &mut reqbufs as *mut _ as *mut std::os::raw::c_void,
            )
        }
        .map_err(|source| UvcError::Ioctl {
            path: String::new(),
            name: "VIDIOC_REQBUFS",
            source,
        })?;

        if reqbufs.count != requested {
            log::warn!(
                "kernel granted {} buffers, {} were requested",
                reqbufs.count,
                requested
            );
        }

        let mut handles = Vec::with_capacity(reqbufs.count as usize);
        for index in 0..reqbufs.count {
            if let Err(err) = Self::map_one(fd, index, &mut handles) {
                log::error!("mapping buffer {index} failed: {err}, rolling back");
                Self::unmap_all(&mut handles);
                let _ = Self::request(fd, 0);
                return Err(UvcError::Mmap {
                    index: index as usize,
                    source: err,
                });
            }
        }

        Ok(BufferPool { fd, handles })
    }

    fn map_one(fd: c_int, index: u32, handles: &mut Vec<BufferHandle>) -> io::Result<()> {
        let mut buf = zeroed_buffer(index);
        unsafe {
            v4l2::ioctl(
                fd,
                ioctl::VIDIOC_QUERYBUF,
                &mut buf as *mut _ as *mut std::os::raw::c_void,
            )?;

            let addr = v4l2::mmap(buf.length as usize, fd, buf.m_offset as i64)?;
            handles.push(BufferHandle {
                addr: addr as *mut u8,
                size: buf.length as usize,
            });
        }
        Ok(())
    }

    fn unmap_all(handles: &mut Vec<BufferHandle>) {
        // Reverse order of acquisition: see DESIGN.md Open Question (a).
        while let Some(handle) = handles.pop() {
            unsafe {
                if let Err(err) = v4l2::munmap(handle.addr as *mut std::os::raw::c_void, handle.size) {
                    log::warn!("munmap failed: {err}, continuing");
                }
            }
        }
    }

    fn request(fd: c_int, count: u32) -> io::Result<()> {
        let mut reqbufs = zeroed_reqbufs(count);
        unsafe {
            v4l2::ioctl(
                fd,
                ioctl::VIDIOC_REQBUFS,
                &mut reqbufs as *mut _ as *mut std::os::raw::c_void,
            )
        }
    }

    /// Unmaps every slot in reverse order of acquisition, then tells the
    /// kernel to drop the buffer request. Individual unmap failures are
    /// logged but do not stop the rest of the teardown.
    pub fn release(mut self) -> Result<()> {
        Self::unmap_all(&mut self.handles);
        Self::request(self.fd, 0).map_err(|source| UvcError::Ioctl {
            path: String::new(),
            name: "VIDIOC_REQBUFS(0)",
            source,
        })
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn slot(&self, index: usize) -> &BufferHandle {
        &self.handles[index]
    }

    /// `QUERYBUF`: returns the slot's current `flags` word.
    pub fn query(&self, index: u32) -> io::Result<u32> {
        let mut buf = zeroed_buffer(index);
        unsafe {
            v4l2::ioctl(
                self.fd,
                ioctl::VIDIOC_QUERYBUF,
                &mut buf as *mut _ as *mut std::os::raw::c_void,
            )?;
        }
        Ok(buf.flags)
    }

    pub fn is_queued(flags: u32) -> bool {
        flags & V4L2_BUF_FLAG_QUEUED != 0
    }

    pub fn is_done(flags: u32) -> bool {
        flags & V4L2_BUF_FLAG_DONE != 0
    }

    /// `QBUF`. `EAGAIN` is returned as `Ok(false)`, not an error; any other
    /// errno propagates.
    pub fn queue(&self, index: u32, bytes_used: u32, timestamp: libc::timeval) -> io::Result<bool> {
        let mut buf = zeroed_buffer(index);
        buf.bytesused = bytes_used;
        buf.timestamp = timestamp;
        match unsafe {
            v4l2::ioctl(
                self.fd,
                ioctl::VIDIOC_QBUF,
                &mut buf as *mut _ as *mut std::os::raw::c_void,
            )
        } {
            Ok(()) => Ok(true),
            Err(err) if err.raw_os_error() == Some(libc::EAGAIN) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// `DQBUF`. Returns `None` on `EAGAIN` (not-ready, not an error).
    pub fn dequeue(&self) -> io::Result<Option<u32>> {
        let mut buf = zeroed_buffer(0);
        match unsafe {
            v4l2::ioctl(
                self.fd,
                ioctl::VIDIOC_DQBUF,
                &mut buf as *mut _ as *mut std::os::raw::c_void,
            )
        } {
            Ok(()) => Ok(Some(buf.index)),
            Err(err) if err.raw_os_error() == Some(libc::EAGAIN) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_helpers_read_the_right_bits() {
        assert!(BufferPool::is_queued(V4L2_BUF_FLAG_QUEUED));
        assert!(!BufferPool::is_queued(V4L2_BUF_FLAG_DONE));
        assert!(BufferPool::is_done(V4L2_BUF_FLAG_DONE));
    }
}
