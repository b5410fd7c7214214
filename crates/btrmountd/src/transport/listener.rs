//! Serial accept loop for the control socket.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use btrmount_config::SocketEndpoint;

use super::socket::BoundSocket;
use super::{ConnectionHandler, ConnectionStream, HandlerFault, LISTENER_TARGET, ListenerError};

/// Pause between polls while no client is waiting.
const IDLE_POLL: Duration = Duration::from_millis(25);
/// Pause after a failed accept before trying again.
const ACCEPT_RETRY: Duration = Duration::from_millis(150);

/// Callback invoked once when the accept loop stops because of a fault.
pub(crate) type FaultHook = Box<dyn FnOnce() + Send>;

/// Control socket bound but not yet accepting.
#[derive(Debug)]
pub(crate) struct SocketListener {
    endpoint: SocketEndpoint,
    socket: BoundSocket,
}

impl SocketListener {
    pub(crate) fn bind(endpoint: &SocketEndpoint) -> Result<Self, ListenerError> {
        let socket = BoundSocket::bind(endpoint)?;
        Ok(Self {
            endpoint: endpoint.clone(),
            socket,
        })
    }

    #[cfg(test)]
    pub(crate) fn local_addr(&self) -> Option<std::net::SocketAddr> {
        self.socket.local_addr()
    }

    /// Moves the socket onto the listener thread and starts accepting.
    ///
    /// Connections are handled inline, one after another. When the handler
    /// panics or reports a [`HandlerFault`] the loop stops, `on_fault` runs,
    /// and the fault is returned from [`ListenerHandle::join`]. The socket,
    /// and with it any Unix socket file, is released when the thread ends.
    pub(crate) fn start(
        self,
        handler: Arc<dyn ConnectionHandler>,
        on_fault: FaultHook,
    ) -> Result<ListenerHandle, ListenerError> {
        self.socket
            .set_nonblocking()
            .map_err(ListenerError::Configure)?;
        let stop = Arc::new(AtomicBool::new(false));
        let serve_loop = ServeLoop {
            endpoint: self.endpoint,
            socket: self.socket,
            handler,
            stop: Arc::clone(&stop),
            served: 0,
        };
        let thread = thread::Builder::new()
            .name("btrmountd-listener".to_owned())
            .spawn(move || {
                let outcome = serve_loop.run();
                if outcome.is_err() {
                    on_fault();
                }
                outcome
            })
            .map_err(ListenerError::Spawn)?;
        Ok(ListenerHandle {
            stop,
            thread: Some(thread),
        })
    }
}

/// Handle to the running listener thread.
pub(crate) struct ListenerHandle {
    stop: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<Result<(), HandlerFault>>>,
}

impl ListenerHandle {
    /// Asks the loop to stop after the exchange in progress, if any.
    pub(crate) fn shutdown(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Waits for the loop to finish and reports how it ended.
    pub(crate) fn join(mut self) -> Result<(), ListenerError> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        match thread.join() {
            Ok(outcome) => outcome.map_err(ListenerError::from),
            Err(_) => Err(ListenerError::ThreadPanic),
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct ServeLoop {
    endpoint: SocketEndpoint,
    socket: BoundSocket,
    handler: Arc<dyn ConnectionHandler>,
    stop: Arc<AtomicBool>,
    served: u64,
}

impl ServeLoop {
    fn run(mut self) -> Result<(), HandlerFault> {
        info!(
            target: LISTENER_TARGET,
            endpoint = %self.endpoint,
            "control socket accepting connections"
        );
        let mut repeated_failure = None;
        while !self.stop.load(Ordering::SeqCst) {
            match self.socket.accept() {
                Ok(Some(stream)) => {
                    repeated_failure = None;
                    self.serve(stream)?;
                }
                Ok(None) => thread::sleep(IDLE_POLL),
                Err(failure) => {
                    if repeated_failure != Some(failure.kind()) {
                        warn!(
                            target: LISTENER_TARGET,
                            error = %failure,
                            "failed to accept a connection"
                        );
                    }
                    repeated_failure = Some(failure.kind());
                    thread::sleep(ACCEPT_RETRY);
                }
            }
        }
        info!(
            target: LISTENER_TARGET,
            endpoint = %self.endpoint,
            connections = self.served,
            "control socket closed"
        );
        Ok(())
    }

    fn serve(&mut self, stream: ConnectionStream) -> Result<(), HandlerFault> {
        self.served += 1;
        debug!(
            target: LISTENER_TARGET,
            connection = self.served,
            "serving connection"
        );
        let handler = self.handler.as_ref();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler.handle(stream)))
            .unwrap_or_else(|payload| Err(HandlerFault::from_panic(payload.as_ref())));
        if let Err(fault) = &outcome {
            error!(
                target: LISTENER_TARGET,
                connection = self.served,
                error = %fault,
                "stopping listener after internal fault"
            );
        }
        outcome
    }
}
