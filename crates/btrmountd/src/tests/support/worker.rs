//! In-memory worker double whose lifecycle is driven by the test.

use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::supervisor::{Worker, WorkerExit};

#[derive(Debug, Default)]
struct ControlState {
    exit: Option<WorkerExit>,
    stops: usize,
}

/// Shared switchboard for one or more [`StubWorker`]s.
#[derive(Debug, Clone, Default)]
pub struct WorkerControl {
    state: Arc<Mutex<ControlState>>,
}

impl WorkerControl {
    /// Makes every worker on this control report `exit`.
    pub fn exit_with(&self, exit: WorkerExit) {
        self.state.lock().expect("worker control poisoned").exit = Some(exit);
    }

    /// Exit status reported so far, if any.
    #[must_use]
    pub fn exit(&self) -> Option<WorkerExit> {
        self.state.lock().expect("worker control poisoned").exit
    }

    /// Number of stop requests received.
    #[must_use]
    pub fn stop_count(&self) -> usize {
        self.state.lock().expect("worker control poisoned").stops
    }
}

/// Worker that never runs a process.
#[derive(Debug)]
pub struct StubWorker {
    control: WorkerControl,
}

impl StubWorker {
    #[must_use]
    pub fn new(control: WorkerControl) -> Self {
        Self { control }
    }
}

impl Worker for StubWorker {
    fn pid(&self) -> u32 {
        4242
    }

    fn try_exit(&mut self) -> io::Result<Option<WorkerExit>> {
        Ok(self.control.exit())
    }

    fn stop(&mut self, _grace: Duration) -> io::Result<WorkerExit> {
        let mut state = self.control.state.lock().expect("worker control poisoned");
        state.stops += 1;
        Ok(*state.exit.get_or_insert(WorkerExit::Signal(15)))
    }
}
