//! The per-device background thread: an epoll loop over gadget file
//! descriptors plus the `STOPPED/STARTING/STARTED/STOPPING/FAILED` task
//! state machine that gates `sink_data` admission.
//!
//! Grounded on `original_source/.../uvc.c`'s `uvc_device_task` /
//! `spawn_task` / `join_task` and the teacher's `src/device.rs` `Handle`
//! (raw fd + blocking ioctl ownership pattern).

use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::error::UvcError;

/// Lifecycle states of the device's background thread. `Failed` is
/// absorbing: once set, only a fresh `Device` recovers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum State {
    Stopped = 0,
    Starting = 1,
    Started = 2,
    Stopping = 3,
    Failed = 4,
}

impl From<u8> for State {
    fn from(value: u8) -> Self {
        match value {
            1 => State::Starting,
            2 => State::Started,
            3 => State::Stopping,
            4 => State::Failed,
            _ => State::Stopped,
        }
    }
}

/// Shared, lock-free task state, readable by the producer thread without
/// contending with the mutex that guards device data.
#[derive(Debug, Default)]
pub struct TaskState(AtomicU8);

impl TaskState {
    pub fn get(&self) -> State {
        State::from(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: State) {
        self.0.store(state as u8, Ordering::Release);
    }
}

const EPOLL_TIMEOUT_MS: i32 = 250;
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// Called by the event loop once an fd is readable. `endpoint` is the index
/// of the fd within the list passed to `spawn`.
pub trait EventHandler: Send + Sync {
    fn handle_events(&self, endpoint: usize);
}

pub struct Task {
    state: Arc<TaskState>,
    handle: Option<JoinHandle<()>>,
}

impl Task {
    /// Spawns the event-loop thread. `fds` are registered for `EPOLLPRI |
    /// EPOLLERR | EPOLLHUP`; negative fds (unused endpoint slots) are
    /// skipped.
    pub fn spawn<H>(fds: Vec<RawFd>, handler: Arc<H>) -> Result<Task, UvcError>
    where
        H: EventHandler + 'static,
    {
        let state = Arc::new(TaskState::default());
        state.set(State::Starting);

        let thread_state = Arc::clone(&state);
        let builder = std::thread::Builder::new().name("uvc-gadget-task".into());
        let handle = builder
            .spawn(move || run(fds, handler, thread_state))
            .map_err(|source| UvcError::ThreadSpawn { source })?;

        Ok(Task {
            state,
            handle: Some(handle),
        })
    }

    pub fn state(&self) -> State {
        self.state.get()
    }

    /// Requests the loop to exit and blocks until the thread has joined.
    pub fn join(&mut self) {
        if self.state.get() == State::Stopped {
            return;
        }
        self.state.set(State::Stopping);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        self.state.set(State::Stopped);
    }
}

impl Drop for Task {
    fn drop(&mut self) {
        self.join();
    }
}

fn run<H: EventHandler + 'static>(fds: Vec<RawFd>, handler: Arc<H>, state: Arc<TaskState>) {
    let epoll_fd = unsafe { libc::epoll_create1(0) };
    if epoll_fd < 0 {
        log::error!("epoll_create1 failed: {}", std::io::Error::last_os_error());
        state.set(State::Failed);
        return;
    }

    for (endpoint, &fd) in fds.iter().enumerate() {
        if fd < 0 {
            continue;
        }
        let mut event = libc::epoll_event {
            events: (libc::EPOLLPRI | libc::EPOLLERR | libc::EPOLLHUP) as u32,
            u64: endpoint as u64,
        };
        let rc = unsafe { libc::epoll_ctl(epoll_fd, libc::EPOLL_CTL_ADD, fd, &mut event) };
        if rc < 0 {
            log::error!(
                "epoll_ctl(ADD) failed for endpoint {endpoint}: {}",
                std::io::Error::last_os_error()
            );
            unsafe { libc::close(epoll_fd) };
            state.set(State::Failed);
            return;
        }
    }

    state.set(State::Started);
    log::debug!("device task started, watching {} fds", fds.len());

    let mut last_heartbeat = Instant::now();
    let mut heartbeat_count: u64 = 0;
    let mut events = [libc::epoll_event { events: 0, u64: 0 }; 16];

    loop {
        if state.get() == State::Stopping {
            break;
        }

        if last_heartbeat.elapsed() >= HEARTBEAT_INTERVAL {
            heartbeat_count += 1;
            log::debug!("device task heartbeat #{heartbeat_count}");
            last_heartbeat = Instant::now();
        }

        let n = unsafe {
            libc::epoll_wait(
                epoll_fd,
                events.as_mut_ptr(),
                events.len() as i32,
                EPOLL_TIMEOUT_MS,
            )
        };

        if n < 0 {
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EINTR) {
                continue;
            }
            log::error!("epoll_wait failed: {err}");
            state.set(State::Failed);
            break;
        }

        for event in events.iter().take(n as usize) {
            let endpoint = event.u64 as usize;
            if event.events & (libc::EPOLLPRI as u32) != 0 {
                handler.handle_events(endpoint);
            }
        }
    }

    unsafe { libc::close(epoll_fd) };
    log::debug!("device task exiting");
}

/// Convenience admission check for `sink_data`: maps task state to the
/// producer-visible disposition without touching the device mutex.
pub fn admit(state: State) -> Admission {
    match state {
        State::Failed | State::Stopped | State::Stopping => Admission::Reject,
        State::Starting => Admission::SoftBusy,
        State::Started => Admission::Proceed,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Proceed,
    SoftBusy,
    Reject,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admission_rejects_terminal_states() {
        assert_eq!(admit(State::Failed), Admission::Reject);
        assert_eq!(admit(State::Stopped), Admission::Reject);
        assert_eq!(admit(State::Stopping), Admission::Reject);
    }

    #[test]
    fn admission_treats_starting_as_soft_busy() {
        assert_eq!(admit(State::Starting), Admission::SoftBusy);
    }

    #[test]
    fn admission_proceeds_when_started() {
        assert_eq!(admit(State::Started), Admission::Proceed);
    }

    #[test]
    fn new_task_state_defaults_to_stopped() {
        let ts = TaskState::default();
        assert_eq!(ts.get(), State::Stopped);
    }
}
