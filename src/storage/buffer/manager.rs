use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, trace, warn};
use parking_lot::{Condvar, Mutex};

use crate::common::types::{BufferRef, TxNum};
use crate::storage::disk::FileManager;
use crate::storage::page::BlockId;
use crate::transaction::wal::LogManager;

use super::buffer::Buffer;
use super::error::BufferPoolError;

/// A fixed pool of buffer frames shared by every transaction.
///
/// The page table maps resident blocks to pool slots and its mutex is the
/// pool-wide critical section: pin, unpin and victim selection all run
/// under it, and individual frame mutexes are only taken while it is
/// held, so the table lock always comes first.
///
/// A pin request that finds no unpinned frame waits on the condition
/// variable until an unpin frees one or the wait limit passes, at which
/// point the request fails with [`BufferPoolError::PoolExhausted`] and
/// the caller is expected to abort.
pub struct BufferManager {
    pool: Vec<BufferRef>,
    table: Mutex<HashMap<BlockId, usize>>,
    cond: Condvar,
    max_wait: Duration,
    file_manager: Arc<FileManager>,
    log_manager: Arc<LogManager>,
}

impl BufferManager {
    pub fn new(
        file_manager: Arc<FileManager>,
        log_manager: Arc<LogManager>,
        pool_size: usize,
        max_wait: Duration,
    ) -> Self {
        let block_size = file_manager.block_size();
        let pool = (0..pool_size)
            .map(|_| Arc::new(Mutex::new(Buffer::new(block_size))))
            .collect();
        Self {
            pool,
            table: Mutex::new(HashMap::new()),
            cond: Condvar::new(),
            max_wait,
            file_manager,
            log_manager,
        }
    }

    /// Pin `blk` into a frame, reading it from disk unless it is already
    /// resident, and return the frame. Every successful pin must be paired
    /// with an [`BufferManager::unpin`].
    pub fn pin(&self, blk: &BlockId) -> Result<BufferRef, BufferPoolError> {
        let deadline = Instant::now() + self.max_wait;
        let mut table = self.table.lock();
        loop {
            if let Some(buf) = self.try_pin(&mut table, blk)? {
                return Ok(buf);
            }
            trace!("pool full, waiting to pin {blk}");
            if self.cond.wait_until(&mut table, deadline).timed_out() {
                return match self.try_pin(&mut table, blk)? {
                    Some(buf) => Ok(buf),
                    None => {
                        warn!("gave up pinning {blk} after {:?}", self.max_wait);
                        Err(BufferPoolError::PoolExhausted)
                    }
                };
            }
        }
    }

    /// Release one pin on the frame. The last unpin makes the frame a
    /// victim candidate and wakes waiting pin requests.
    pub fn unpin(&self, buf: &BufferRef) {
        let _table = self.table.lock();
        let mut frame = buf.lock();
        frame.unpin();
        if !frame.is_pinned() {
            drop(frame);
            self.cond.notify_all();
        }
    }

    /// Flush every frame dirtied by the given transaction.
    pub fn flush_all(&self, tx_num: TxNum) -> Result<(), BufferPoolError> {
        let _table = self.table.lock();
        for buf in &self.pool {
            let mut frame = buf.lock();
            if frame.modifying_tx() == Some(tx_num) {
                frame.flush(&self.file_manager, &self.log_manager)?;
            }
        }
        Ok(())
    }

    /// Flush every dirty frame regardless of owner. Checkpointing uses
    /// this to make the whole pool clean before truncating the log.
    pub fn flush_dirty(&self) -> Result<(), BufferPoolError> {
        let _table = self.table.lock();
        let mut flushed = 0;
        for buf in &self.pool {
            let mut frame = buf.lock();
            if frame.modifying_tx().is_some() {
                frame.flush(&self.file_manager, &self.log_manager)?;
                flushed += 1;
            }
        }
        debug!("flushed {flushed} dirty buffers");
        Ok(())
    }

    /// Number of currently unpinned frames.
    pub fn available(&self) -> usize {
        let _table = self.table.lock();
        self.pool
            .iter()
            .filter(|buf| !buf.lock().is_pinned())
            .count()
    }

    pub fn pool_size(&self) -> usize {
        self.pool.len()
    }

    fn try_pin(
        &self,
        table: &mut HashMap<BlockId, usize>,
        blk: &BlockId,
    ) -> Result<Option<BufferRef>, BufferPoolError> {
        if let Some(&idx) = table.get(blk) {
            let buf = self.pool[idx].clone();
            buf.lock().pin();
            return Ok(Some(buf));
        }

        let Some(idx) = self.choose_victim(table) else {
            return Ok(None);
        };
        let buf = self.pool[idx].clone();
        {
            let mut frame = buf.lock();
            if let Some(old) = frame.block() {
                trace!("evicting {old} from slot {idx} for {blk}");
                table.remove(&old.clone());
            }
            frame.assign_to_block(&self.file_manager, &self.log_manager, blk.clone())?;
            frame.pin();
        }
        table.insert(blk.clone(), idx);
        Ok(Some(buf))
    }

    // Prefer a clean unpinned frame so pinning stays free of writes when
    // it can; fall back to a dirty one, which assign_to_block will flush.
    fn choose_victim(&self, _table: &HashMap<BlockId, usize>) -> Option<usize> {
        let mut dirty_candidate = None;
        for (idx, buf) in self.pool.iter().enumerate() {
            let frame = buf.lock();
            if frame.is_pinned() {
                continue;
            }
            if frame.modifying_tx().is_none() {
                return Some(idx);
            }
            dirty_candidate.get_or_insert(idx);
        }
        dirty_candidate
    }
}
