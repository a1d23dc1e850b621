//! Unix-domain `SOCK_STREAM` transport: socket creation with recv/send
//! timeouts, connect/bind, and `SCM_RIGHTS` ancillary fd passing.
//!
//! Grounded on `original_source/.../uvc_common.c`'s `socket_create` /
//! `socket_connect` / `socket_bind` / `socket_destroy` and
//! `uvc_connection.c`'s `recv_ctrl_reply`.

use std::ffi::CString;
use std::io;
use std::mem;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::RawFd;
use std::path::Path;

use crate::proxy::wire::{Reply, REPLY_SIZE};

const RECV_TIMEOUT_MS: u32 = 10;
const SEND_TIMEOUT_MS: u32 = 5;

fn timeval_from_ms(ms: u32) -> libc::timeval {
    libc::timeval {
        tv_sec: (ms / 1000) as libc::time_t,
        tv_usec: ((ms % 1000) * 1000) as libc::suseconds_t,
    }
}

/// Creates an `AF_UNIX`/`SOCK_STREAM` socket with the proxy's fixed recv/send
/// timeouts. Sets `SO_SNDTIMEO` for the send-side timeout, not a second
/// `SO_RCVTIMEO` (see DESIGN.md Open Question (c)).
pub fn socket_create() -> io::Result<RawFd> {
    let fd = unsafe { libc::socket(libc::AF_UNIX, libc::SOCK_STREAM, 0) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }

    let rtv = timeval_from_ms(RECV_TIMEOUT_MS);
    let rc = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_RCVTIMEO,
            &rtv as *const _ as *const libc::c_void,
            mem::size_of::<libc::timeval>() as libc::socklen_t,
        )
    };
    if rc < 0 {
        let err = io::Error::last_os_error();
        unsafe { libc::close(fd) };
        return Err(err);
    }

    let stv = timeval_from_ms(SEND_TIMEOUT_MS);
    let rc = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_SNDTIMEO,
            &stv as *const _ as *const libc::c_void,
            mem::size_of::<libc::timeval>() as libc::socklen_t,
        )
    };
    if rc < 0 {
        let err = io::Error::last_os_error();
        unsafe { libc::close(fd) };
        return Err(err);
    }

    log::debug!("socket {fd} created, recv {RECV_TIMEOUT_MS}ms send {SEND_TIMEOUT_MS}ms");
    Ok(fd)
}

fn sockaddr_un(path: &Path) -> io::Result<libc::sockaddr_un> {
    let c_path = CString::new(path.as_os_str().as_bytes())?;
    let bytes = c_path.as_bytes_with_nul();
    if bytes.len() > 108 {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "path too long for sun_path"));
    }

    let mut addr: libc::sockaddr_un = unsafe { mem::zeroed() };
    addr.sun_family = libc::AF_UNIX as libc::sa_family_t;
    for (dst, &src) in addr.sun_path.iter_mut().zip(bytes.iter()) {
        *dst = src as libc::c_char;
    }
    Ok(addr)
}

pub fn socket_connect(fd: RawFd, path: &Path) -> io::Result<()> {
    let addr = sockaddr_un(path)?;
    let rc = unsafe {
        libc::connect(
            fd,
            &addr as *const _ as *const libc::sockaddr,
            mem::size_of::<libc::sockaddr_un>() as libc::socklen_t,
        )
    };
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

pub fn socket_bind(fd: RawFd, path: &Path) -> io::Result<()> {
    let addr = sockaddr_un(path)?;
    let rc = unsafe {
        libc::bind(
            fd,
            &addr as *const _ as *const libc::sockaddr,
            mem::size_of::<libc::sockaddr_un>() as libc::socklen_t,
        )
    };
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

pub fn socket_destroy(fd: RawFd, path: Option<&Path>) -> io::Result<()> {
    if let Some(path) = path {
        let c_path = CString::new(path.as_os_str().as_bytes())?;
        unsafe { libc::unlink(c_path.as_ptr()) };
    }
    if fd >= 0 && unsafe { libc::close(fd) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Sends raw bytes with `send(2)`.
pub fn send(fd: RawFd, buf: &[u8]) -> io::Result<usize> {
    let n = unsafe { libc::send(fd, buf.as_ptr() as *const libc::c_void, buf.len(), 0) };
    if n < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(n as usize)
    }
}

/// Receives a `Reply` frame, extracting the shared-memory fd out-of-band via
/// `recvmsg`'s `SCM_RIGHTS` ancillary data (the in-band copy is overwritten).
pub fn recv_reply(fd: RawFd) -> io::Result<Reply> {
    let mut payload = [0u8; REPLY_SIZE];
    let mut iov = libc::iovec {
        iov_base: payload.as_mut_ptr() as *mut libc::c_void,
        iov_len: REPLY_SIZE,
    };

    let cmsg_space = unsafe { libc::CMSG_SPACE(mem::size_of::<RawFd>() as u32) } as usize;
    let mut cbuf = vec![0u8; cmsg_space];

    let mut hdr: libc::msghdr = unsafe { mem::zeroed() };
    hdr.msg_iov = &mut iov;
    hdr.msg_iovlen = 1;
    hdr.msg_control = cbuf.as_mut_ptr() as *mut libc::c_void;
    hdr.msg_controllen = cbuf.len();

    let n = unsafe { libc::recvmsg(fd, &mut hdr, 0) };
    if n < 0 {
        return Err(io::Error::last_os_error());
    }

    let mut reply = Reply::from_bytes(&payload);

    let cmsg = unsafe { libc::CMSG_FIRSTHDR(&hdr) };
    if !cmsg.is_null() {
        unsafe {
            let data = libc::CMSG_DATA(cmsg);
            let mut fd_bytes = [0u8; mem::size_of::<RawFd>()];
            std::ptr::copy_nonoverlapping(data, fd_bytes.as_mut_ptr(), fd_bytes.len());
            reply.shm_fd = RawFd::from_ne_bytes(fd_bytes);
        }
    } else {
        log::warn!("recv_reply: no SCM_RIGHTS ancillary data, shm_fd stays in-band");
    }

    Ok(reply)
}

/// Sends a `Reply` frame with the shared-memory fd attached as `SCM_RIGHTS`
/// ancillary data. Used by the allocator side of the proxy.
pub fn send_reply_with_fd(fd: RawFd, reply: &Reply, shm_fd: RawFd) -> io::Result<()> {
    let payload = reply.to_bytes();
    let mut iov = libc::iovec {
        iov_base: payload.as_ptr() as *mut libc::c_void,
        iov_len: payload.len(),
    };

    let cmsg_space = unsafe { libc::CMSG_SPACE(mem::size_of::<RawFd>() as u32) } as usize;
    let mut cbuf = vec![0u8; cmsg_space];

    let mut hdr: libc::msghdr = unsafe { mem::zeroed() };
    hdr.msg_iov = &mut iov;
    hdr.msg_iovlen = 1;
    hdr.msg_control = cbuf.as_mut_ptr() as *mut libc::c_void;
    hdr.msg_controllen = cbuf.len();

    unsafe {
        let cmsg = libc::CMSG_FIRSTHDR(&hdr);
        (*cmsg).cmsg_level = libc::SOL_SOCKET;
        (*cmsg).cmsg_type = libc::SCM_RIGHTS;
        (*cmsg).cmsg_len = libc::CMSG_LEN(mem::size_of::<RawFd>() as u32) as usize;
        std::ptr::copy_nonoverlapping(
            &shm_fd as *const RawFd as *const u8,
            libc::CMSG_DATA(cmsg),
            mem::size_of::<RawFd>(),
        );
    }

    let n = unsafe { libc::sendmsg(fd, &hdr, 0) };
    if n < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}
