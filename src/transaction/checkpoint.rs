use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info};
use parking_lot::{Condvar, Mutex};
use thiserror::Error;

use crate::storage::buffer::{BufferManager, BufferPoolError};
use crate::transaction::recovery::LogRecord;
use crate::transaction::wal::{LogError, LogManager};

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("log error: {0}")]
    Log(#[from] LogError),

    #[error("buffer error: {0}")]
    Buffer(#[from] BufferPoolError),
}

struct GateState {
    active: u64,
    draining: bool,
}

/// Counts in-flight client requests and lets the checkpoint drain them.
///
/// Each request holds a [`RequestTicket`] for its duration. While a
/// drain is in progress new tickets block, so the system quiesces: the
/// checkpoint waits for the active count to reach zero, does its work,
/// and then reopens the gate.
pub struct ActiveRequestsCounter {
    state: Mutex<GateState>,
    cond: Condvar,
}

impl ActiveRequestsCounter {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState {
                active: 0,
                draining: false,
            }),
            cond: Condvar::new(),
        }
    }

    /// Register a request, blocking while a checkpoint holds the gate
    /// shut. Dropping the ticket deregisters the request.
    pub fn enter(&self) -> RequestTicket<'_> {
        let mut state = self.state.lock();
        while state.draining {
            self.cond.wait(&mut state);
        }
        state.active += 1;
        RequestTicket { counter: self }
    }

    pub fn active(&self) -> u64 {
        self.state.lock().active
    }

    fn exit(&self) {
        let mut state = self.state.lock();
        debug_assert!(state.active > 0, "ticket drop without a matching enter");
        state.active -= 1;
        drop(state);
        self.cond.notify_all();
    }

    /// Shut the gate and wait until every admitted request has finished.
    fn begin_drain(&self) {
        let mut state = self.state.lock();
        state.draining = true;
        while state.active > 0 {
            self.cond.wait(&mut state);
        }
    }

    fn end_drain(&self) {
        let mut state = self.state.lock();
        state.draining = false;
        drop(state);
        self.cond.notify_all();
    }
}

impl Default for ActiveRequestsCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Proof of admission through the gate; requests hold one for as long as
/// they run.
pub struct RequestTicket<'a> {
    counter: &'a ActiveRequestsCounter,
}

impl Drop for RequestTicket<'_> {
    fn drop(&mut self) {
        self.counter.exit();
    }
}

/// Quiescent checkpointing: with no requests running, every dirty page
/// is made durable, so the log history before this point can never be
/// needed again and the log file is cut back to a single fresh record.
pub struct Checkpoint {
    log_manager: Arc<LogManager>,
    buffer_manager: Arc<BufferManager>,
    gate: Arc<ActiveRequestsCounter>,
    running: AtomicBool,
    // serializes concurrent execute() calls
    lock: Mutex<()>,
}

impl Checkpoint {
    pub fn new(
        log_manager: Arc<LogManager>,
        buffer_manager: Arc<BufferManager>,
        gate: Arc<ActiveRequestsCounter>,
    ) -> Self {
        Self {
            log_manager,
            buffer_manager,
            gate,
            running: AtomicBool::new(false),
            lock: Mutex::new(()),
        }
    }

    /// Run one checkpoint: drain active requests, flush log then dirty
    /// buffers, truncate the log, and write a fresh CHECKPOINT record.
    /// Requests resume even when a step fails.
    pub fn execute(&self) -> Result<(), CheckpointError> {
        let _serial = self.lock.lock();
        self.running.store(true, Ordering::SeqCst);
        debug!("checkpoint: waiting for active requests to drain");
        self.gate.begin_drain();

        let result = self.quiesced_checkpoint();

        self.gate.end_drain();
        self.running.store(false, Ordering::SeqCst);
        result
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Block until no checkpoint is executing.
    pub fn wait_complete(&self) {
        let _serial = self.lock.lock();
    }

    fn quiesced_checkpoint(&self) -> Result<(), CheckpointError> {
        self.log_manager.flush_all()?;
        self.buffer_manager.flush_dirty()?;
        self.log_manager.shrink()?;
        let lsn = LogRecord::Checkpoint { active: vec![] }.write_to(&self.log_manager)?;
        self.log_manager.flush_lsn(lsn)?;
        info!("checkpoint complete at lsn {lsn}");
        Ok(())
    }
}
