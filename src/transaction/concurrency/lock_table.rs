use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::{trace, warn};
use parking_lot::{Condvar, Mutex};
use thiserror::Error;

use crate::storage::page::BlockId;

#[derive(Error, Debug)]
pub enum LockError {
    #[error("lock wait on {0} timed out; the transaction must abort")]
    Abort(BlockId),
}

/// The global block-level lock table, shared by every transaction.
///
/// Each entry is a signed counter: -1 means one exclusive holder, a
/// positive value counts shared holders, absence means unlocked. Waiters
/// block on the condition variable with a deadline; a request that cannot
/// be granted within `max_wait` fails with [`LockError::Abort`], which
/// bounds every wait-for cycle and so doubles as deadlock handling.
pub struct LockTable {
    locks: Mutex<HashMap<BlockId, i64>>,
    cond: Condvar,
    max_wait: Duration,
}

impl LockTable {
    pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(10);

    pub fn new(max_wait: Duration) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            cond: Condvar::new(),
            max_wait,
        }
    }

    /// Acquire a shared lock on `blk`, waiting out any exclusive holder.
    pub fn wait_shared_lock(&self, blk: &BlockId) -> Result<(), LockError> {
        let deadline = Instant::now() + self.max_wait;
        let mut locks = self.locks.lock();
        while has_exclusive(&locks, blk) {
            if self.cond.wait_until(&mut locks, deadline).timed_out()
                && has_exclusive(&locks, blk)
            {
                warn!("shared lock on {blk} timed out");
                return Err(LockError::Abort(blk.clone()));
            }
        }
        *locks.entry(blk.clone()).or_insert(0) += 1;
        trace!("slock granted on {blk}");
        Ok(())
    }

    /// Acquire an exclusive lock on `blk`. The caller must already hold a
    /// shared lock on the block, so the wait is only for the *other*
    /// shared holders to drain; the caller's own share is folded into the
    /// exclusive entry.
    pub fn wait_exclusive_lock(&self, blk: &BlockId) -> Result<(), LockError> {
        let deadline = Instant::now() + self.max_wait;
        let mut locks = self.locks.lock();
        while has_other_shared(&locks, blk) {
            if self.cond.wait_until(&mut locks, deadline).timed_out()
                && has_other_shared(&locks, blk)
            {
                warn!("exclusive lock on {blk} timed out");
                return Err(LockError::Abort(blk.clone()));
            }
        }
        locks.insert(blk.clone(), -1);
        trace!("xlock granted on {blk}");
        Ok(())
    }

    /// Release one lock on `blk` and wake every waiter. An exclusive
    /// entry or the last share removes the entry.
    pub fn unlock(&self, blk: &BlockId) {
        let mut locks = self.locks.lock();
        match locks.get_mut(blk) {
            Some(val) if *val > 1 => *val -= 1,
            Some(_) => {
                locks.remove(blk);
            }
            None => {}
        }
        self.cond.notify_all();
    }
}

impl Default for LockTable {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_WAIT)
    }
}

fn has_exclusive(locks: &HashMap<BlockId, i64>, blk: &BlockId) -> bool {
    matches!(locks.get(blk), Some(val) if *val < 0)
}

fn has_other_shared(locks: &HashMap<BlockId, i64>, blk: &BlockId) -> bool {
    matches!(locks.get(blk), Some(val) if *val > 1)
}
