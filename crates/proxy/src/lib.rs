//! Runs the compositor core on its own thread.
//!
//! The main thread owns a `MainThreadHandle`. Control messages and commits go
//! over a bounded crossbeam channel, input gestures over an rtrb ring with a
//! wake-up channel next to it. Replies come back as `MainThreadMessage` on an
//! unbounded channel so the impl thread only ever waits on its inbox.

mod impl_thread;
mod messages;

use std::fmt;
use std::thread::JoinHandle;
use std::time::Duration;

use compositor_protocol::OutputSurface;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use rtrb::{Producer, PushError};

pub use impl_thread::ImplThread;
pub use messages::{
    BeginMainFrameArgs, CommitPayload, ImplThreadMessage, InputGesture, MainThreadMessage,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProxyConfig {
    pub inbox_capacity: usize,
    pub input_ring_capacity: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            inbox_capacity: 64,
            input_ring_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyError {
    ZeroCapacity,
    SpawnFailed,
    ImplThreadGone,
    MainThreadGone,
    InputRingFull,
}

impl fmt::Display for ProxyError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyError::ZeroCapacity => write!(formatter, "proxy queues need a non-zero capacity"),
            ProxyError::SpawnFailed => write!(formatter, "failed to spawn the impl thread"),
            ProxyError::ImplThreadGone => write!(formatter, "impl thread is no longer running"),
            ProxyError::MainThreadGone => write!(formatter, "main thread handle was dropped"),
            ProxyError::InputRingFull => write!(formatter, "input gesture ring is full"),
        }
    }
}

impl std::error::Error for ProxyError {}

/// Creates output surfaces on the impl thread, again after every loss.
pub trait OutputSurfaceFactory: Send + 'static {
    fn create_output_surface(&mut self) -> Box<dyn OutputSurface>;
}

impl<F> OutputSurfaceFactory for F
where
    F: FnMut() -> Box<dyn OutputSurface> + Send + 'static,
{
    fn create_output_surface(&mut self) -> Box<dyn OutputSurface> {
        self()
    }
}

pub struct MainThreadHandle {
    inbox: Sender<ImplThreadMessage>,
    outbox: Receiver<MainThreadMessage>,
    input_producer: Producer<InputGesture>,
    input_notify: Sender<()>,
    join_handle: Option<JoinHandle<()>>,
}

impl MainThreadHandle {
    pub fn send(&self, message: ImplThreadMessage) -> Result<(), ProxyError> {
        self.inbox
            .send(message)
            .map_err(|_| ProxyError::ImplThreadGone)
    }

    /// Queues a gesture without blocking. A full ring drops the gesture.
    pub fn push_gesture(&mut self, gesture: InputGesture) -> Result<(), ProxyError> {
        match self.input_producer.push(gesture) {
            Ok(()) => {}
            Err(PushError::Full(dropped)) => {
                log::warn!("[proxy] input ring full, dropping {dropped:?}");
                return Err(ProxyError::InputRingFull);
            }
        }
        match self.input_notify.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => Ok(()),
            Err(TrySendError::Disconnected(())) => Err(ProxyError::ImplThreadGone),
        }
    }

    pub fn try_recv(&self) -> Result<Option<MainThreadMessage>, ProxyError> {
        match self.outbox.try_recv() {
            Ok(message) => Ok(Some(message)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(ProxyError::ImplThreadGone),
        }
    }

    /// Returns `None` when nothing arrived within `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<MainThreadMessage>, ProxyError> {
        match self.outbox.recv_timeout(timeout) {
            Ok(message) => Ok(Some(message)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(ProxyError::ImplThreadGone),
        }
    }

    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(join_handle) = self.join_handle.take() else {
            return;
        };
        if self.inbox.send(ImplThreadMessage::Shutdown).is_err() {
            log::debug!("[proxy] impl thread already stopped");
        }
        if join_handle.join().is_err() {
            log::error!("[proxy] impl thread panicked");
        }
    }
}

impl Drop for MainThreadHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
