//! Ordered update queue (many producers, one consumer).
//!
//! Backed by an unbounded tokio mpsc channel, so `enqueue` never waits on the
//! worker. The receiver half is handed to exactly one `UpdateWorker`, which is
//! what makes application order equal to enqueue order.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use pdp_core::error::{PdpError, Result};
use pdp_core::protocol::PolicySource;
use tokio::sync::mpsc;

/// One pending policy update.
#[derive(Debug, Clone)]
pub struct UpdateCommand {
    /// Strictly increasing in enqueue order.
    pub seq: u64,
    pub id: String,
    pub source: PolicySource,
    pub received_at: Instant,
}

/// Producer side, shared by control-plane handlers.
pub struct UpdateQueue {
    tx: mpsc::UnboundedSender<UpdateCommand>,
    // seq assignment and send happen under this lock so seq order == channel order
    next_seq: Mutex<u64>,
    depth: Arc<AtomicUsize>,
    accepted: AtomicU64,
}

/// Consumer side. Not `Clone`: there is exactly one.
pub struct UpdateReceiver {
    rx: mpsc::UnboundedReceiver<UpdateCommand>,
    depth: Arc<AtomicUsize>,
}

impl UpdateQueue {
    pub fn channel() -> (Self, UpdateReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let depth = Arc::new(AtomicUsize::new(0));
        (
            Self {
                tx,
                next_seq: Mutex::new(1),
                depth: Arc::clone(&depth),
                accepted: AtomicU64::new(0),
            },
            UpdateReceiver { rx, depth },
        )
    }

    /// Queue an update and return its sequence number.
    /// Fails with `QueueClosed` once the consumer has shut down.
    pub fn enqueue(&self, id: String, source: PolicySource) -> Result<u64> {
        let mut next = self.next_seq.lock().unwrap_or_else(|e| e.into_inner());
        let seq = *next;
        let cmd = UpdateCommand {
            seq,
            id,
            source,
            received_at: Instant::now(),
        };

        self.depth.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(cmd).is_err() {
            self.depth.fetch_sub(1, Ordering::SeqCst);
            return Err(PdpError::QueueClosed);
        }
        *next += 1;
        self.accepted.fetch_add(1, Ordering::Relaxed);
        Ok(seq)
    }

    /// Commands queued but not yet taken by the worker.
    pub fn len(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total commands accepted since startup.
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }
}

impl UpdateReceiver {
    /// Wait for the next command. `None` once closed and drained.
    pub async fn recv(&mut self) -> Option<UpdateCommand> {
        let cmd = self.rx.recv().await?;
        self.depth.fetch_sub(1, Ordering::SeqCst);
        Some(cmd)
    }

    /// Refuse new commands; already queued ones stay receivable.
    pub fn close(&mut self) {
        self.rx.close();
    }
}
