//! The client side of the proxy-connection subsystem: connects to a
//! well-known Unix-domain socket, negotiates a shared-memory slot pool, and
//! forwards producer frames as notify datagrams.
//!
//! Grounded on `original_source/.../uvc_connection.c`'s
//! `uvc_connection_create` / `uvc_connection_sink_data` /
//! `uvc_connection_destroy`.

pub mod shm;
pub mod transport;
pub mod wire;

use std::os::unix::io::RawFd;
use std::path::{Path, PathBuf};

use crate::data::FrameSource;
use crate::error::{Result, UvcError};
use shm::{Backing, SharedMemory};
use wire::{Notify, Request};

pub struct ProxyConnection {
    fd: RawFd,
    path: Option<PathBuf>,
    owns_path: bool,
    mem: SharedMemory,
    curr_no: u64,
    drop_no: u64,
}

impl ProxyConnection {
    /// Connects to `path`, requests allocation for `endpoint`, and maps the
    /// returned shared-memory slots.
    pub fn create(path: &Path, endpoint: u64) -> Result<ProxyConnection> {
        let fd = transport::socket_create().map_err(|source| UvcError::ProxyIo { source })?;
        transport::socket_connect(fd, path).map_err(|source| UvcError::ProxyIo { source })?;

        let request = Request {
            alloc: true,
            idx: endpoint,
        };
        transport::send(fd, &request.to_bytes()).map_err(|source| UvcError::ProxyIo { source })?;

        let reply = transport::recv_reply(fd).map_err(|source| UvcError::ProxyIo { source })?;
        if reply.slot_count == 0 || reply.slot_size == 0 {
            return Err(UvcError::ProxyProtocol {
                reason: "allocation reply carried a zero slot count or size",
            });
        }

        let mem = SharedMemory::from_fd(
            reply.shm_fd,
            reply.shm_name,
            reply.slot_size as usize,
            reply.slot_count as usize,
        )
        .map_err(|source| UvcError::ProxyIo { source })?;

        Ok(ProxyConnection {
            fd,
            path: Some(path.to_path_buf()),
            owns_path: false,
            mem,
            curr_no: 0,
            drop_no: 0,
        })
    }

    /// Extracts `frame` into the next slot and sends a notify datagram. Send
    /// failure drops the frame and logs, but does not disconnect.
    pub fn sink_data(&mut self, frame: &dyn FrameSource) {
        let slot = self.mem.slot((self.curr_no % self.mem.slot_count as u64) as usize);
        let bytes_used = frame.fill(slot);

        let notify = Notify {
            curr_no: self.curr_no,
            bytes_used: bytes_used as u64,
            timestamp_us: frame.timestamp_us(),
            addr: 0,
        };

        match transport::send(self.fd, &notify.to_bytes()) {
            Ok(_) => self.curr_no += 1,
            Err(err) => {
                self.drop_no += 1;
                log::warn!("proxy notify send failed, dropped {}/{}: {err}", self.drop_no, self.curr_no);
            }
        }
    }

    /// Unmaps slots, closes the shm/socket fds, and unlinks the socket path
    /// if this side created it (the listener, not a client).
    pub fn destroy(self) {
        if let Err(err) = self.mem.release() {
            log::warn!("proxy shared memory release failed: {err}");
        }
        let unlink_path = if self.owns_path { self.path.as_deref() } else { None };
        if let Err(err) = transport::socket_destroy(self.fd, unlink_path) {
            log::warn!("proxy socket teardown failed: {err}");
        }
    }
}

/// Server-side allocation helper: binds `path`, creates a backing of
/// `slot_count * slot_size` bytes, and hands the fd to the caller to attach
/// to an accepted connection's reply via `transport::send_reply_with_fd`.
pub fn allocate_backing(backing: Backing, name: &str, slot_size: usize, slot_count: usize) -> Result<SharedMemory> {
    SharedMemory::create(backing, name, slot_size, slot_count).map_err(|source| UvcError::ProxyIo { source })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullFrame;

    impl FrameSource for NullFrame {
        fn fill(&self, dst: &mut [u8]) -> usize {
            dst.len()
        }

        fn timestamp_us(&self) -> u64 {
            0
        }
    }

    #[test]
    fn allocate_backing_produces_usable_slots() {
        let mem = allocate_backing(Backing::Memfd, "uvc-gadget-proxy-test", 4096, 2).unwrap();
        assert_eq!(mem.slot_count, 2);
        mem.release().unwrap();
    }
}
