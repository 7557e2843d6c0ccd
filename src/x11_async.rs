//! Async readiness for the X11 socket
//!
//! x11rb only offers a blocking `wait_for_event`. A dedicated thread sleeps
//! on the connection's descriptor instead and wakes the event loop through a
//! [`Notify`]. When the socket hangs up or polling breaks, the failure is
//! kept and handed to the loop as a connection error.

use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use x11rb::connection::Connection;
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;

use crate::error::{WmError, WmResult};

const SOCKET: mio::Token = mio::Token(0);

/// Upper bound on how long the watcher takes to notice shutdown
const SHUTDOWN_CHECK: Duration = Duration::from_millis(100);

/// State shared between the watcher thread and the event loop
#[derive(Default)]
struct Readiness {
    wake: Notify,
    failure: Mutex<Option<String>>,
    stopped: AtomicBool,
}

impl Readiness {
    /// Start a thread watching `fd` for input
    fn watch(fd: RawFd) -> WmResult<Arc<Self>> {
        let mut poll = mio::Poll::new()
            .map_err(|e| WmError::Connection(format!("failed to create poller: {}", e)))?;
        poll.registry()
            .register(&mut mio::unix::SourceFd(&fd), SOCKET, mio::Interest::READABLE)
            .map_err(|e| WmError::Connection(format!("failed to watch X11 socket: {}", e)))?;

        let readiness = Arc::new(Self::default());
        let shared = readiness.clone();
        std::thread::Builder::new()
            .name("x11-readiness".into())
            .spawn(move || shared.run(poll))
            .map_err(|e| WmError::Connection(format!("failed to start socket watcher: {}", e)))?;

        Ok(readiness)
    }

    fn run(&self, mut poll: mio::Poll) {
        let mut events = mio::Events::with_capacity(4);

        while !self.stopped.load(Ordering::SeqCst) {
            match poll.poll(&mut events, Some(SHUTDOWN_CHECK)) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return self.fail(format!("X11 socket poll failed: {}", e)),
            }

            let mut readable = false;
            for event in events.iter().filter(|e| e.token() == SOCKET) {
                if event.is_error() || event.is_read_closed() {
                    return self.fail("X11 socket closed".into());
                }
                readable |= event.is_readable();
            }
            if readable {
                self.wake.notify_one();
            }
        }
        tracing::debug!("X11 socket watcher stopped");
    }

    fn fail(&self, reason: String) {
        tracing::error!("{}", reason);
        *self.failure.lock().unwrap_or_else(|p| p.into_inner()) = Some(reason);
        self.wake.notify_one();
    }

    fn failure(&self) -> WmResult<()> {
        match &*self.failure.lock().unwrap_or_else(|p| p.into_inner()) {
            Some(reason) => Err(WmError::Connection(reason.clone())),
            None => Ok(()),
        }
    }

    async fn wait(&self) -> WmResult<()> {
        self.failure()?;
        self.wake.notified().await;
        self.failure()
    }
}

/// Event source for the viewer's connection
pub struct X11EventStream {
    conn: Arc<RustConnection>,
    readiness: Arc<Readiness>,
}

impl X11EventStream {
    pub fn new(conn: Arc<RustConnection>) -> WmResult<Self> {
        let readiness = Readiness::watch(conn.stream().as_raw_fd())?;
        Ok(Self { conn, readiness })
    }

    /// Next buffered event, without blocking
    pub fn poll_next_event(&self) -> WmResult<Option<Event>> {
        Ok(self.conn.poll_for_event()?)
    }

    /// Sleep until the socket has input
    ///
    /// Fails with [`WmError::Connection`] once the socket is gone.
    pub async fn wait_readable(&self) -> WmResult<()> {
        self.readiness.wait().await
    }

    pub fn flush(&self) -> WmResult<()> {
        self.conn.flush()?;
        Ok(())
    }
}

impl Drop for X11EventStream {
    fn drop(&mut self) {
        self.readiness.stopped.store(true, Ordering::SeqCst);
    }
}
