use std::sync::Arc;

use log::info;
use thiserror::Error;

use crate::common::types::{BufferRef, TxNum};
use crate::storage::buffer::{BufferManager, BufferPoolError};
use crate::storage::disk::{FileManager, FileManagerError};
use crate::storage::page::{BlockId, PageError};
use crate::transaction::buffer_list::BufferList;
use crate::transaction::concurrency::{ConcurrencyManager, LockError, LockTable};
use crate::transaction::recovery::RecoveryManager;
use crate::transaction::wal::{LogError, LogManager};

#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("lock error: {0}")]
    Lock(#[from] LockError),

    #[error("buffer error: {0}")]
    Buffer(#[from] BufferPoolError),

    #[error("log error: {0}")]
    Log(#[from] LogError),

    #[error("I/O error: {0}")]
    Io(#[from] FileManagerError),

    #[error("page error: {0}")]
    Page(#[from] PageError),

    #[error("block {0} is not pinned by this transaction")]
    NotPinned(BlockId),
}

/// A unit of atomic, isolated work against the database files.
///
/// Reads take shared locks and writes take exclusive locks, all held
/// until [`Transaction::commit`] or [`Transaction::rollback`]; every
/// write is preceded by an undo log record. A transaction must pin a
/// block before reading or writing it and owns the pin until it unpins
/// or ends.
pub struct Transaction {
    file_manager: Arc<FileManager>,
    buffer_manager: Arc<BufferManager>,
    recovery: RecoveryManager,
    concurrency: ConcurrencyManager,
    buffers: BufferList,
    tx_num: TxNum,
}

impl Transaction {
    pub fn new(
        file_manager: Arc<FileManager>,
        log_manager: Arc<LogManager>,
        buffer_manager: Arc<BufferManager>,
        lock_table: Arc<LockTable>,
        tx_num: TxNum,
    ) -> Result<Self, TransactionError> {
        let recovery = RecoveryManager::new(log_manager, buffer_manager.clone(), tx_num)?;
        Ok(Self {
            file_manager,
            buffers: BufferList::new(buffer_manager.clone()),
            buffer_manager,
            recovery,
            concurrency: ConcurrencyManager::new(lock_table),
            tx_num,
        })
    }

    pub fn tx_num(&self) -> TxNum {
        self.tx_num
    }

    /// Pin `blk` for the duration of the transaction (or until an
    /// explicit unpin). Pinning takes no lock; the first read or write
    /// does.
    pub fn pin(&mut self, blk: &BlockId) -> Result<(), TransactionError> {
        self.buffers.pin(blk)?;
        Ok(())
    }

    pub fn unpin(&mut self, blk: &BlockId) {
        self.buffers.unpin(blk);
    }

    /// Read the i32 at `offset` of `blk` under a shared lock.
    pub fn get_int(&mut self, blk: &BlockId, offset: usize) -> Result<i32, TransactionError> {
        self.concurrency.request_shared(blk)?;
        let buf = self.pinned(blk)?;
        let val = buf.lock().page().get_int(offset);
        Ok(val)
    }

    /// Read the string at `offset` of `blk` under a shared lock.
    pub fn get_string(&mut self, blk: &BlockId, offset: usize) -> Result<String, TransactionError> {
        self.concurrency.request_shared(blk)?;
        let buf = self.pinned(blk)?;
        let val = buf.lock().page().get_string(offset)?;
        Ok(val)
    }

    /// Read the byte slice at `offset` of `blk` under a shared lock.
    pub fn get_bytes(&mut self, blk: &BlockId, offset: usize) -> Result<Vec<u8>, TransactionError> {
        self.concurrency.request_shared(blk)?;
        let buf = self.pinned(blk)?;
        let val = buf.lock().page().get_bytes(offset)?.to_vec();
        Ok(val)
    }

    /// Write an i32 under an exclusive lock. When `log` is set, the old
    /// value is appended to the log first so the write can be undone;
    /// undo itself passes `false`.
    pub fn set_int(
        &mut self,
        blk: &BlockId,
        offset: usize,
        val: i32,
        log: bool,
    ) -> Result<(), TransactionError> {
        self.concurrency.request_exclusive(blk)?;
        let buf = self.pinned(blk)?;
        let mut frame = buf.lock();
        let lsn = if log {
            let old = frame.page().get_int(offset);
            Some(self.recovery.log_set_int(blk, offset, old)?)
        } else {
            None
        };
        frame.page_mut().set_int(offset, val);
        frame.set_modified(self.tx_num, lsn);
        Ok(())
    }

    /// Write a string under an exclusive lock, logging the old value
    /// when `log` is set.
    pub fn set_string(
        &mut self,
        blk: &BlockId,
        offset: usize,
        val: &str,
        log: bool,
    ) -> Result<(), TransactionError> {
        self.concurrency.request_exclusive(blk)?;
        let buf = self.pinned(blk)?;
        let mut frame = buf.lock();
        let lsn = if log {
            let old = frame.page().get_string(offset)?;
            Some(self.recovery.log_set_string(blk, offset, old)?)
        } else {
            None
        };
        frame.page_mut().set_string(offset, val);
        frame.set_modified(self.tx_num, lsn);
        Ok(())
    }

    /// Write a byte slice under an exclusive lock, logging the old value
    /// when `log` is set.
    pub fn set_bytes(
        &mut self,
        blk: &BlockId,
        offset: usize,
        val: &[u8],
        log: bool,
    ) -> Result<(), TransactionError> {
        self.concurrency.request_exclusive(blk)?;
        let buf = self.pinned(blk)?;
        let mut frame = buf.lock();
        let lsn = if log {
            let old = frame.page().get_bytes(offset)?.to_vec();
            Some(self.recovery.log_set_bytes(blk, offset, old)?)
        } else {
            None
        };
        frame.page_mut().set_bytes(offset, val);
        frame.set_modified(self.tx_num, lsn);
        Ok(())
    }

    /// Number of blocks in `filename`, read under a shared lock on the
    /// file's end-of-file marker so it cannot change underneath the
    /// transaction.
    pub fn size(&mut self, filename: &str) -> Result<u64, TransactionError> {
        self.concurrency.request_shared(&BlockId::end_of_file(filename))?;
        Ok(self.file_manager.block_count(filename)?)
    }

    /// Extend `filename` by one zeroed block under an exclusive lock on
    /// the end-of-file marker.
    pub fn append(&mut self, filename: &str) -> Result<BlockId, TransactionError> {
        self.concurrency
            .request_exclusive(&BlockId::end_of_file(filename))?;
        Ok(self.file_manager.append(filename)?)
    }

    pub fn block_size(&self) -> usize {
        self.file_manager.block_size()
    }

    pub fn available_buffers(&self) -> usize {
        self.buffer_manager.available()
    }

    /// Make the transaction's changes permanent: force the commit record
    /// to the log, then release locks and pins. Data pages are left in
    /// the pool.
    pub fn commit(&mut self) -> Result<(), TransactionError> {
        self.recovery.commit()?;
        self.concurrency.release();
        self.buffers.unpin_all();
        info!("transaction {} committed", self.tx_num);
        Ok(())
    }

    /// Undo the transaction's changes, then release locks and pins.
    pub fn rollback(&mut self) -> Result<(), TransactionError> {
        let recovery = self.recovery.clone();
        recovery.rollback(self)?;
        self.concurrency.release();
        self.buffers.unpin_all();
        info!("transaction {} rolled back", self.tx_num);
        Ok(())
    }

    /// Run restart recovery on behalf of this transaction: flush its own
    /// state, then undo every unfinished transaction found in the log.
    pub fn recover(&mut self) -> Result<(), TransactionError> {
        self.buffer_manager.flush_all(self.tx_num)?;
        let recovery = self.recovery.clone();
        recovery.recover(self)?;
        Ok(())
    }

    fn pinned(&self, blk: &BlockId) -> Result<BufferRef, TransactionError> {
        self.buffers
            .get(blk)
            .ok_or_else(|| TransactionError::NotPinned(blk.clone()))
    }
}
