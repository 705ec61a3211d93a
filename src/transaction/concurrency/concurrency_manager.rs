use std::collections::HashMap;
use std::sync::Arc;

use crate::storage::page::BlockId;

use super::lock_table::{LockError, LockTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LockMode {
    Shared,
    Exclusive,
}

/// One transaction's view of the shared lock table.
///
/// Tracks which locks the transaction already holds so repeated requests
/// are free, upgrades a held shared lock in place when an exclusive lock
/// is requested, and releases everything at once when the transaction
/// ends. Locks are never released early; that is what makes the schedule
/// strict two-phase.
pub struct ConcurrencyManager {
    lock_table: Arc<LockTable>,
    held: HashMap<BlockId, LockMode>,
}

impl ConcurrencyManager {
    pub fn new(lock_table: Arc<LockTable>) -> Self {
        Self {
            lock_table,
            held: HashMap::new(),
        }
    }

    /// Acquire a shared lock on `blk`. A no-op when any lock on the block
    /// is already held.
    pub fn request_shared(&mut self, blk: &BlockId) -> Result<(), LockError> {
        if !self.held.contains_key(blk) {
            self.lock_table.wait_shared_lock(blk)?;
            self.held.insert(blk.clone(), LockMode::Shared);
        }
        Ok(())
    }

    /// Acquire an exclusive lock on `blk`, upgrading a held shared lock
    /// in place. A no-op when the exclusive lock is already held.
    pub fn request_exclusive(&mut self, blk: &BlockId) -> Result<(), LockError> {
        if self.held.get(blk) != Some(&LockMode::Exclusive) {
            self.request_shared(blk)?;
            self.lock_table.wait_exclusive_lock(blk)?;
            self.held.insert(blk.clone(), LockMode::Exclusive);
        }
        Ok(())
    }

    /// Release every held lock. Called once, when the transaction commits
    /// or rolls back.
    pub fn release(&mut self) {
        for blk in self.held.keys() {
            self.lock_table.unlock(blk);
        }
        self.held.clear();
    }
}
