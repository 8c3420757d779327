//! # Tick Queue
//!
//! Work that must happen on the main tick loop is posted here from any thread
//! and executed, in posting order, the next time the loop calls
//! [`TickQueue::run_pending`]. Cache hooks use it to hand derived-state
//! updates (regions, maps) over to the tick thread.

use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, trace};

/// A unit of work for the tick thread.
pub type TickTask = Box<dyn FnOnce() + Send + 'static>;

/// Cheaply cloneable handle to the main-loop task queue.
#[derive(Clone)]
pub struct TickQueue {
    sender: mpsc::UnboundedSender<TickTask>,
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<TickTask>>>,
    pending: Arc<AtomicUsize>,
}

impl TickQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Queues `task` for the next tick. Never blocks.
    pub fn post(&self, task: impl FnOnce() + Send + 'static) {
        self.pending.fetch_add(1, Ordering::AcqRel);
        if self.sender.send(Box::new(task)).is_err() {
            // The receiver lives in `self`, so this only happens mid-drop.
            self.pending.fetch_sub(1, Ordering::AcqRel);
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Runs every task queued so far and returns how many ran. Tasks posted
    /// by the tasks themselves wait for the next call.
    pub fn run_pending(&self) -> usize {
        let budget = self.pending();
        let mut receiver = self.receiver.lock();
        let mut ran = 0;
        while ran < budget {
            let Ok(task) = receiver.try_recv() else { break };
            self.pending.fetch_sub(1, Ordering::AcqRel);
            ran += 1;
            if catch_unwind(AssertUnwindSafe(task)).is_err() {
                error!("❌ Tick task panicked");
            }
        }
        if ran > 0 {
            trace!("Ran {} tick task(s)", ran);
        }
        ran
    }
}

impl Default for TickQueue {
    fn default() -> Self {
        Self::new()
    }
}
