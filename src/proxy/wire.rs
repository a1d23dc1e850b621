//! Fixed-size proxy-connection wire frames (32/64/64 bytes), sized to avoid
//! framing ambiguity on a `SOCK_STREAM` socket.
//!
//! Grounded on `original_source/.../uvc_ctrl_api.h`'s `uvc_ctrl_request_t` /
//! `uvc_ctrl_reply_t` / `uvc_ctrl_notify_t` unions. Byte order is host order,
//! same-machine IPC only, matching the original.

pub const REQUEST_SIZE: usize = 32;
pub const REPLY_SIZE: usize = 64;
pub const NOTIFY_SIZE: usize = 64;

pub const MEM_NAME_SIZE: usize = 32;

/// `uvc_ctrl_request_t`: `flags.alloc` (bit 0 of a u64) + `data.idx`.
#[derive(Debug, Clone, Copy)]
pub struct Request {
    pub alloc: bool,
    pub idx: u64,
}

impl Request {
    pub fn to_bytes(self) -> [u8; REQUEST_SIZE] {
        let mut buf = [0u8; REQUEST_SIZE];
        let flags: u64 = if self.alloc { 1 } else { 0 };
        buf[0..8].copy_from_slice(&flags.to_ne_bytes());
        buf[8..16].copy_from_slice(&self.idx.to_ne_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8; REQUEST_SIZE]) -> Request {
        let flags = u64::from_ne_bytes(buf[0..8].try_into().unwrap());
        let idx = u64::from_ne_bytes(buf[8..16].try_into().unwrap());
        Request {
            alloc: flags & 1 != 0,
            idx,
        }
    }
}

/// `uvc_ctrl_reply_t`: status word + `{fd, name[32], num, size}`. The `fd`
/// carried in-band is a placeholder; the real descriptor crosses via
/// `SCM_RIGHTS` and overwrites it on receipt (see `proxy::transport`).
#[derive(Debug, Clone)]
pub struct Reply {
    pub shm_fd: i32,
    pub shm_name: String,
    pub slot_count: u8,
    pub slot_size: u32,
}

impl Reply {
    pub fn to_bytes(&self) -> [u8; REPLY_SIZE] {
        let mut buf = [0u8; REPLY_SIZE];
        // status word (unused fields in the original union) left zero.
        buf[8..12].copy_from_slice(&self.shm_fd.to_ne_bytes());
        let name_bytes = self.shm_name.as_bytes();
        let n = name_bytes.len().min(MEM_NAME_SIZE);
        buf[12..12 + n].copy_from_slice(&name_bytes[..n]);
        buf[12 + MEM_NAME_SIZE] = self.slot_count;
        let size_off = 12 + MEM_NAME_SIZE + 1;
        buf[size_off..size_off + 4].copy_from_slice(&self.slot_size.to_ne_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8; REPLY_SIZE]) -> Reply {
        let shm_fd = i32::from_ne_bytes(buf[8..12].try_into().unwrap());
        let name_end = 12 + MEM_NAME_SIZE;
        let shm_name = String::from_utf8_lossy(&buf[12..name_end])
            .trim_end_matches('\0')
            .to_string();
        let slot_count = buf[name_end];
        let size_off = name_end + 1;
        let slot_size = u32::from_ne_bytes(buf[size_off..size_off + 4].try_into().unwrap());
        Reply {
            shm_fd,
            shm_name,
            slot_count,
            slot_size,
        }
    }
}

/// `uvc_ctrl_notify_t`: `{curr_no, bytesused, timestamp_us, addr}`. `addr`
/// is carried for wire compatibility with the original but unused on the
/// receiving side of this port (the consumer already has its own mapping).
#[derive(Debug, Clone, Copy)]
pub struct Notify {
    pub curr_no: u64,
    pub bytes_used: u64,
    pub timestamp_us: u64,
    pub addr: u64,
}

impl Notify {
    pub fn to_bytes(self) -> [u8; NOTIFY_SIZE] {
        let mut buf = [0u8; NOTIFY_SIZE];
        buf[0..8].copy_from_slice(&self.curr_no.to_ne_bytes());
        buf[8..16].copy_from_slice(&self.bytes_used.to_ne_bytes());
        buf[16..24].copy_from_slice(&self.timestamp_us.to_ne_bytes());
        buf[24..32].copy_from_slice(&self.addr.to_ne_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8; NOTIFY_SIZE]) -> Notify {
        Notify {
            curr_no: u64::from_ne_bytes(buf[0..8].try_into().unwrap()),
            bytes_used: u64::from_ne_bytes(buf[8..16].try_into().unwrap()),
            timestamp_us: u64::from_ne_bytes(buf[16..24].try_into().unwrap()),
            addr: u64::from_ne_bytes(buf[24..32].try_into().unwrap()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_roundtrips() {
        let req = Request { alloc: true, idx: 3 };
        let bytes = req.to_bytes();
        let back = Request::from_bytes(&bytes);
        assert!(back.alloc);
        assert_eq!(back.idx, 3);
    }

    #[test]
    fn reply_roundtrips_name_and_size() {
        let rep = Reply {
            shm_fd: 42,
            shm_name: "uvc-shm-0".to_string(),
            slot_count: 2,
            slot_size: 3_110_400,
        };
        let bytes = rep.to_bytes();
        let back = Reply::from_bytes(&bytes);
        assert_eq!(back.shm_fd, 42);
        assert_eq!(back.shm_name, "uvc-shm-0");
        assert_eq!(back.slot_count, 2);
        assert_eq!(back.slot_size, 3_110_400);
    }

    #[test]
    fn notify_roundtrips() {
        let notify = Notify {
            curr_no: 7,
            bytes_used: 1024,
            timestamp_us: 99,
            addr: 0,
        };
        let back = Notify::from_bytes(&notify.to_bytes());
        assert_eq!(back.curr_no, 7);
        assert_eq!(back.bytes_used, 1024);
        assert_eq!(back.timestamp_us, 99);
    }
}
