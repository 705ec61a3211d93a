use std::collections::HashSet;
use std::sync::Arc;

use log::{debug, info};

use crate::common::types::{Lsn, TxNum};
use crate::storage::buffer::BufferManager;
use crate::storage::page::BlockId;
use crate::transaction::transaction::{Transaction, TransactionError};
use crate::transaction::wal::{LogError, LogManager};

use super::log_record::LogRecord;

/// Per-transaction recovery logic: writes the log records that describe
/// the transaction's changes and replays them backwards on rollback or
/// restart.
///
/// Recovery is undo-only. Committed changes whose pages never reached
/// disk are not reconstructed; in exchange, commit only has to force the
/// log, never data pages. Clones share the same log and buffer managers.
#[derive(Clone)]
pub struct RecoveryManager {
    log_manager: Arc<LogManager>,
    buffer_manager: Arc<BufferManager>,
    tx_num: TxNum,
}

impl RecoveryManager {
    /// Starts recovery bookkeeping for a new transaction, writing its
    /// START record.
    pub fn new(
        log_manager: Arc<LogManager>,
        buffer_manager: Arc<BufferManager>,
        tx_num: TxNum,
    ) -> Result<Self, LogError> {
        LogRecord::Start { tx: tx_num }.write_to(&log_manager)?;
        Ok(Self {
            log_manager,
            buffer_manager,
            tx_num,
        })
    }

    /// Writes the COMMIT record and forces the log through it. Dirty data
    /// pages stay in the pool; the forced log alone makes the commit
    /// durable.
    pub fn commit(&self) -> Result<(), LogError> {
        let lsn = LogRecord::Commit { tx: self.tx_num }.write_to(&self.log_manager)?;
        self.log_manager.flush_lsn(lsn)?;
        debug!("transaction {} committed at lsn {lsn}", self.tx_num);
        Ok(())
    }

    /// Undoes every change this transaction logged, newest first, then
    /// writes and forces a ROLLBACK record.
    pub fn rollback(&self, tx: &mut Transaction) -> Result<(), TransactionError> {
        for record in self.log_manager.reverse_iterator()? {
            let record = LogRecord::from_bytes(&record?)?;
            if record.tx_num() != Some(self.tx_num) {
                continue;
            }
            if let LogRecord::Start { .. } = record {
                break;
            }
            self.undo(tx, &record)?;
        }
        self.buffer_manager.flush_all(self.tx_num)?;
        let lsn = LogRecord::Rollback { tx: self.tx_num }.write_to(&self.log_manager)?;
        self.log_manager.flush_lsn(lsn)?;
        debug!("transaction {} rolled back", self.tx_num);
        Ok(())
    }

    /// Restart recovery: scans the log backwards undoing every change
    /// that belongs to a transaction with no COMMIT or ROLLBACK record,
    /// stopping at the most recent checkpoint. Finishes by flushing the
    /// restored pages and writing a fresh quiescent checkpoint, which
    /// makes running recovery twice a no-op.
    pub fn recover(&self, tx: &mut Transaction) -> Result<(), TransactionError> {
        let mut finished: HashSet<TxNum> = HashSet::new();
        let mut undone = 0usize;
        for record in self.log_manager.reverse_iterator()? {
            let record = LogRecord::from_bytes(&record?)?;
            match &record {
                LogRecord::Checkpoint { .. } => break,
                LogRecord::Commit { tx: owner } | LogRecord::Rollback { tx: owner } => {
                    finished.insert(*owner);
                }
                LogRecord::Start { .. } => {}
                LogRecord::SetInt { tx: owner, .. }
                | LogRecord::SetString { tx: owner, .. }
                | LogRecord::SetBytes { tx: owner, .. } => {
                    if !finished.contains(owner) {
                        self.undo(tx, &record)?;
                        undone += 1;
                    }
                }
            }
        }
        self.buffer_manager.flush_all(self.tx_num)?;
        let lsn = LogRecord::Checkpoint { active: vec![] }.write_to(&self.log_manager)?;
        self.log_manager.flush_lsn(lsn)?;
        info!("recovery complete, {undone} changes undone");
        Ok(())
    }

    pub fn log_set_int(&self, blk: &BlockId, offset: usize, old: i32) -> Result<Lsn, LogError> {
        LogRecord::SetInt {
            tx: self.tx_num,
            blk: blk.clone(),
            offset,
            old,
        }
        .write_to(&self.log_manager)
    }

    pub fn log_set_string(
        &self,
        blk: &BlockId,
        offset: usize,
        old: String,
    ) -> Result<Lsn, LogError> {
        LogRecord::SetString {
            tx: self.tx_num,
            blk: blk.clone(),
            offset,
            old,
        }
        .write_to(&self.log_manager)
    }

    pub fn log_set_bytes(
        &self,
        blk: &BlockId,
        offset: usize,
        old: Vec<u8>,
    ) -> Result<Lsn, LogError> {
        LogRecord::SetBytes {
            tx: self.tx_num,
            blk: blk.clone(),
            offset,
            old,
        }
        .write_to(&self.log_manager)
    }

    // Writes the logged old value back through the transaction, unlogged
    // so that undo never generates more log.
    fn undo(&self, tx: &mut Transaction, record: &LogRecord) -> Result<(), TransactionError> {
        match record {
            LogRecord::SetInt {
                blk, offset, old, ..
            } => {
                debug!("undo {record}");
                tx.pin(blk)?;
                tx.set_int(blk, *offset, *old, false)?;
                tx.unpin(blk);
            }
            LogRecord::SetString {
                blk, offset, old, ..
            } => {
                debug!("undo {record}");
                tx.pin(blk)?;
                tx.set_string(blk, *offset, old, false)?;
                tx.unpin(blk);
            }
            LogRecord::SetBytes {
                blk, offset, old, ..
            } => {
                debug!("undo {record}");
                tx.pin(blk)?;
                tx.set_bytes(blk, *offset, old, false)?;
                tx.unpin(blk);
            }
            _ => {}
        }
        Ok(())
    }
}
