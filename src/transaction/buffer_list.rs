use std::collections::HashMap;
use std::sync::Arc;

use crate::common::types::BufferRef;
use crate::storage::buffer::{BufferManager, BufferPoolError};
use crate::storage::page::BlockId;

/// The buffers one transaction currently has pinned.
///
/// A transaction may pin the same block several times; each pin is
/// recorded so every one can be handed back to the pool when the
/// transaction ends.
pub(crate) struct BufferList {
    buffers: HashMap<BlockId, BufferRef>,
    pins: Vec<BlockId>,
    buffer_manager: Arc<BufferManager>,
}

impl BufferList {
    pub(crate) fn new(buffer_manager: Arc<BufferManager>) -> Self {
        Self {
            buffers: HashMap::new(),
            pins: Vec::new(),
            buffer_manager,
        }
    }

    pub(crate) fn get(&self, blk: &BlockId) -> Option<BufferRef> {
        self.buffers.get(blk).cloned()
    }

    pub(crate) fn pin(&mut self, blk: &BlockId) -> Result<(), BufferPoolError> {
        let buf = self.buffer_manager.pin(blk)?;
        self.buffers.insert(blk.clone(), buf);
        self.pins.push(blk.clone());
        Ok(())
    }

    pub(crate) fn unpin(&mut self, blk: &BlockId) {
        let Some(buf) = self.buffers.get(blk) else {
            return;
        };
        self.buffer_manager.unpin(buf);
        if let Some(pos) = self.pins.iter().position(|b| b == blk) {
            self.pins.remove(pos);
        }
        if !self.pins.contains(blk) {
            self.buffers.remove(blk);
        }
    }

    pub(crate) fn unpin_all(&mut self) {
        for blk in &self.pins {
            if let Some(buf) = self.buffers.get(blk) {
                self.buffer_manager.unpin(buf);
            }
        }
        self.pins.clear();
        self.buffers.clear();
    }
}
