use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use log::{error, info};
use thiserror::Error;

use crate::storage::buffer::BufferManager;
use crate::storage::disk::{FileManager, FileManagerError};
use crate::transaction::checkpoint::{ActiveRequestsCounter, Checkpoint, CheckpointError, RequestTicket};
use crate::transaction::concurrency::LockTable;
use crate::transaction::transaction::{Transaction, TransactionError};
use crate::transaction::wal::{LogError, LogManager};

#[derive(Error, Debug)]
pub enum DbError {
    #[error("I/O error: {0}")]
    Io(#[from] FileManagerError),

    #[error("log error: {0}")]
    Log(#[from] LogError),

    #[error("transaction error: {0}")]
    Transaction(#[from] TransactionError),

    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),
}

#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Size of every disk block, log block and buffer page, in bytes.
    pub block_size: usize,
    /// Number of frames in the buffer pool.
    pub buffer_count: usize,
    /// Name of the write-ahead log file inside the database directory.
    pub log_file: String,
    /// How long a lock request waits before the transaction aborts.
    pub lock_wait: Duration,
    /// How long a pin request waits before failing with pool exhaustion.
    pub pin_wait: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            block_size: 4096,
            buffer_count: 8,
            log_file: "db.log".to_string(),
            lock_wait: Duration::from_secs(10),
            pin_wait: Duration::from_secs(10),
        }
    }
}

/// The assembled storage engine: file, log, buffer and lock managers
/// wired together, plus transaction numbering and checkpointing.
///
/// Opening an existing database runs restart recovery before the first
/// transaction is handed out, so the files a caller sees always reflect
/// a committed state.
pub struct Database {
    file_manager: Arc<FileManager>,
    log_manager: Arc<LogManager>,
    buffer_manager: Arc<BufferManager>,
    lock_table: Arc<LockTable>,
    gate: Arc<ActiveRequestsCounter>,
    checkpoint: Arc<Checkpoint>,
    next_tx_num: AtomicU64,
}

impl Database {
    /// Open (or with `recreate`, wipe and re-create) the database in
    /// `dir`.
    pub fn new(dir: impl AsRef<Path>, config: DbConfig, recreate: bool) -> Result<Self, DbError> {
        let file_manager = Arc::new(FileManager::new(
            dir.as_ref(),
            config.block_size,
            recreate,
        )?);
        let log_manager = Arc::new(LogManager::new(file_manager.clone(), config.log_file)?);
        let buffer_manager = Arc::new(BufferManager::new(
            file_manager.clone(),
            log_manager.clone(),
            config.buffer_count,
            config.pin_wait,
        ));
        let gate = Arc::new(ActiveRequestsCounter::new());
        let checkpoint = Arc::new(Checkpoint::new(
            log_manager.clone(),
            buffer_manager.clone(),
            gate.clone(),
        ));

        let db = Self {
            file_manager,
            log_manager,
            buffer_manager,
            lock_table: Arc::new(LockTable::new(config.lock_wait)),
            gate,
            checkpoint,
            next_tx_num: AtomicU64::new(1),
        };

        if db.file_manager.is_new() {
            info!("creating new database");
        } else {
            info!("recovering existing database");
            db.recover()?;
        }
        Ok(db)
    }

    /// Start a new transaction with the next transaction number.
    pub fn new_tx(&self) -> Result<Transaction, TransactionError> {
        let tx_num = self.next_tx_num.fetch_add(1, Ordering::SeqCst);
        Transaction::new(
            self.file_manager.clone(),
            self.log_manager.clone(),
            self.buffer_manager.clone(),
            self.lock_table.clone(),
            tx_num,
        )
    }

    /// Take a quiescent checkpoint now.
    pub fn checkpoint(&self) -> Result<(), CheckpointError> {
        self.checkpoint.execute()
    }

    /// Admit one client request through the checkpoint gate; hold the
    /// ticket for the request's duration.
    pub fn begin_request(&self) -> RequestTicket<'_> {
        self.gate.enter()
    }

    pub fn file_manager(&self) -> &Arc<FileManager> {
        &self.file_manager
    }

    pub fn log_manager(&self) -> &Arc<LogManager> {
        &self.log_manager
    }

    pub fn buffer_manager(&self) -> &Arc<BufferManager> {
        &self.buffer_manager
    }

    pub fn block_size(&self) -> usize {
        self.file_manager.block_size()
    }

    fn recover(&self) -> Result<(), TransactionError> {
        let mut tx = self.new_tx()?;
        tx.recover()?;
        tx.commit()?;
        Ok(())
    }
}

impl Drop for Database {
    // A clean shutdown leaves no work for restart recovery.
    fn drop(&mut self) {
        if let Err(e) = self.buffer_manager.flush_dirty() {
            error!("shutdown flush of dirty buffers failed: {e}");
        }
        if let Err(e) = self.log_manager.flush_all() {
            error!("shutdown flush of the log failed: {e}");
        }
    }
}
