use crate::common::types::{Lsn, TxNum};
use crate::storage::disk::FileManager;
use crate::storage::page::{BlockId, Page};
use crate::transaction::wal::LogManager;

use super::error::BufferPoolError;

/// One frame of the buffer pool: a page plus the bookkeeping that ties it
/// to a disk block. A frame with `tx_num` set is dirty; the transaction
/// number records who modified it and `lsn` records the log record
/// covering that modification, so the frame can honor write-ahead logging
/// when it is flushed.
pub struct Buffer {
    page: Page,
    block: Option<BlockId>,
    pins: u32,
    tx_num: Option<TxNum>,
    lsn: Option<Lsn>,
}

impl Buffer {
    pub(crate) fn new(block_size: usize) -> Self {
        Self {
            page: Page::new(block_size),
            block: None,
            pins: 0,
            tx_num: None,
            lsn: None,
        }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn page_mut(&mut self) -> &mut Page {
        &mut self.page
    }

    /// The block this frame currently holds, if any.
    pub fn block(&self) -> Option<&BlockId> {
        self.block.as_ref()
    }

    /// Marks the frame dirty on behalf of a transaction. `lsn` is the log
    /// record protecting the change; operations that are not logged (undo
    /// during rollback) pass `None` and leave the watermark alone.
    pub fn set_modified(&mut self, tx_num: TxNum, lsn: Option<Lsn>) {
        self.tx_num = Some(tx_num);
        if lsn.is_some() {
            self.lsn = lsn;
        }
    }

    pub fn modifying_tx(&self) -> Option<TxNum> {
        self.tx_num
    }

    pub fn is_pinned(&self) -> bool {
        self.pins > 0
    }

    pub(crate) fn pin(&mut self) {
        self.pins += 1;
    }

    pub(crate) fn unpin(&mut self) {
        debug_assert!(self.pins > 0, "unpin of an unpinned buffer");
        self.pins -= 1;
    }

    /// Reads `blk` into the frame, flushing any dirty contents first.
    pub(crate) fn assign_to_block(
        &mut self,
        file_manager: &FileManager,
        log_manager: &LogManager,
        blk: BlockId,
    ) -> Result<(), BufferPoolError> {
        self.flush(file_manager, log_manager)?;
        file_manager.read(&blk, &mut self.page)?;
        self.block = Some(blk);
        self.pins = 0;
        Ok(())
    }

    /// Writes the frame back to disk if it is dirty, forcing the covering
    /// log record out first. Write-ahead logging lives here: no page
    /// reaches disk before the record that can undo it.
    pub(crate) fn flush(
        &mut self,
        file_manager: &FileManager,
        log_manager: &LogManager,
    ) -> Result<(), BufferPoolError> {
        if self.tx_num.is_none() {
            return Ok(());
        }
        if let Some(lsn) = self.lsn {
            log_manager.flush_lsn(lsn)?;
        }
        if let Some(blk) = &self.block {
            file_manager.write(blk, &self.page, true)?;
        }
        self.tx_num = None;
        Ok(())
    }
}
