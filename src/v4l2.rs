//! Thin wrappers over the raw syscalls used to talk to a V4L2 gadget
//! character device: `open`/`close`/`ioctl`/`mmap`/`munmap`, each returning
//! `io::Result` via `io::Error::last_os_error()` on failure.
//!
//! Unlike the capture-device side of this crate, there is no libv4l
//! userspace wrapper here (libv4l exists to emulate capture formats the
//! kernel driver doesn't natively support; the gadget side has no such
//! concept), so these call straight into `libc`, the same way the
//! `v4l2-sys` feature path of `v4l2::api` does.

use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::{io, path::Path, ptr};

use crate::sys::ioctl::IocType;

/// Opens a device node and returns the raw file descriptor.
pub fn open<P: AsRef<Path>>(path: P, flags: i32) -> io::Result<std::os::raw::c_int> {
    let c_path = CString::new(path.as_ref().as_os_str().as_bytes()).unwrap();
    let fd = unsafe { libc::open(c_path.as_ptr(), flags) };

    if fd == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(fd)
    }
}

/// Closes a previously opened file descriptor.
pub fn close(fd: std::os::raw::c_int) -> io::Result<()> {
    let ret = unsafe { libc::close(fd) };

    if ret == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Issues an ioctl against an open file descriptor.
///
/// # Safety
/// `argp` must point to a correctly sized and initialized instance of the
/// struct the given `request` code expects.
pub unsafe fn ioctl(
    fd: std::os::raw::c_int,
    request: IocType,
    argp: *mut std::os::raw::c_void,
) -> io::Result<()> {
    let ret = libc::ioctl(fd, request, argp);

    if ret == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Maps `length` bytes of `fd` at `offset`, read-write, shared.
///
/// # Safety
/// Caller must eventually pass the returned pointer and `length` to
/// [`munmap`] exactly once.
pub unsafe fn mmap(
    length: usize,
    fd: std::os::raw::c_int,
    offset: i64,
) -> io::Result<*mut std::os::raw::c_void> {
    let ptr = libc::mmap(
        ptr::null_mut(),
        length,
        libc::PROT_READ | libc::PROT_WRITE,
        libc::MAP_SHARED,
        fd,
        offset,
    );

    if ptr == libc::MAP_FAILED {
        Err(io::Error::last_os_error())
    } else {
        Ok(ptr)
    }
}

/// Unmaps a region previously returned by [`mmap`].
///
/// # Safety
/// `addr`/`length` must match a prior successful `mmap` call exactly, and
/// must not have been unmapped already.
pub unsafe fn munmap(addr: *mut std::os::raw::c_void, length: usize) -> io::Result<()> {
    let ret = libc::munmap(addr, length);

    if ret == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}
