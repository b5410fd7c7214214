//! Test helpers for the transport module.

use std::io::Read;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use super::{ConnectionHandler, ConnectionStream, HandlerFault};

pub(crate) struct CountingHandler {
    count: Arc<AtomicUsize>,
}

impl CountingHandler {
    pub(crate) fn new() -> (Arc<AtomicUsize>, Arc<Self>) {
        let count = Arc::new(AtomicUsize::new(0));
        let handler = Arc::new(Self {
            count: Arc::clone(&count),
        });
        (count, handler)
    }
}

impl ConnectionHandler for CountingHandler {
    fn handle(&self, _stream: ConnectionStream) -> Result<(), HandlerFault> {
        self.count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Handler that fails every exchange whose message contains `trigger`.
pub(crate) struct FaultingHandler {
    trigger: &'static str,
    panic: bool,
}

impl FaultingHandler {
    pub(crate) fn returning(trigger: &'static str) -> Arc<Self> {
        Arc::new(Self {
            trigger,
            panic: false,
        })
    }

    pub(crate) fn panicking(trigger: &'static str) -> Arc<Self> {
        Arc::new(Self {
            trigger,
            panic: true,
        })
    }
}

impl ConnectionHandler for FaultingHandler {
    fn handle(&self, mut stream: ConnectionStream) -> Result<(), HandlerFault> {
        let mut message = String::new();
        let _ = stream.read_to_string(&mut message);
        if !message.contains(self.trigger) {
            return Ok(());
        }
        assert!(!self.panic, "handler asked to panic");
        Err(HandlerFault::new("scripted fault"))
    }
}
