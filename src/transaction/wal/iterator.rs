use std::sync::Arc;

use crate::storage::disk::FileManager;
use crate::storage::page::{BlockId, Page};
use crate::transaction::wal::log_manager::LogError;

const BOUNDARY: usize = 4;

/// Walks the log newest record first, spanning block boundaries.
///
/// Within a block, records sit most-recent-first starting at the boundary
/// position, so a single forward scan of each block from its boundary is
/// already reverse chronological order; blocks themselves are visited
/// last to first.
pub struct LogReverseIterator {
    file_manager: Arc<FileManager>,
    blk: BlockId,
    page: Page,
    current_pos: usize,
}

impl LogReverseIterator {
    pub(crate) fn new(file_manager: Arc<FileManager>, blk: BlockId) -> Result<Self, LogError> {
        let mut iter = Self {
            page: Page::new(file_manager.block_size()),
            file_manager,
            blk,
            current_pos: 0,
        };
        iter.move_to_block()?;
        Ok(iter)
    }

    fn move_to_block(&mut self) -> Result<(), LogError> {
        self.file_manager.read(&self.blk, &mut self.page)?;
        let boundary = self.page.get_int(0) as usize;
        if boundary < BOUNDARY || boundary > self.page.size() {
            return Err(LogError::Corrupt(format!(
                "bad boundary {boundary} in log block {}",
                self.blk
            )));
        }
        self.current_pos = boundary;
        Ok(())
    }

    fn next_record(&mut self) -> Result<Option<Vec<u8>>, LogError> {
        if self.current_pos == self.page.size() {
            if self.blk.number() == 0 {
                return Ok(None);
            }
            self.blk = BlockId::new(self.blk.filename(), self.blk.number() - 1);
            self.move_to_block()?;
        }
        let record = self.page.get_bytes(self.current_pos)?.to_vec();
        self.current_pos += BOUNDARY + record.len();
        Ok(Some(record))
    }
}

impl Iterator for LogReverseIterator {
    type Item = Result<Vec<u8>, LogError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

/// Walks the log oldest record first, from block 0 through the block that
/// was the log tail when the iterator was created.
pub struct LogIterator {
    file_manager: Arc<FileManager>,
    filename: String,
    blk_num: u64,
    last_blk_num: u64,
    page: Page,
    // record positions within the current block, oldest first
    positions: Vec<usize>,
    next_idx: usize,
}

impl LogIterator {
    pub(crate) fn new(
        file_manager: Arc<FileManager>,
        filename: String,
        last_blk_num: u64,
    ) -> Result<Self, LogError> {
        let mut iter = Self {
            page: Page::new(file_manager.block_size()),
            file_manager,
            filename,
            blk_num: 0,
            last_blk_num,
            positions: Vec::new(),
            next_idx: 0,
        };
        iter.move_to_block()?;
        Ok(iter)
    }

    fn move_to_block(&mut self) -> Result<(), LogError> {
        let blk = BlockId::new(self.filename.clone(), self.blk_num);
        self.file_manager.read(&blk, &mut self.page)?;
        let boundary = self.page.get_int(0) as usize;
        if boundary < BOUNDARY || boundary > self.page.size() {
            return Err(LogError::Corrupt(format!("bad boundary {boundary} in log block {blk}")));
        }

        // positions ascend newest-to-oldest; reverse for chronological order
        self.positions.clear();
        let mut pos = boundary;
        while pos < self.page.size() {
            self.positions.push(pos);
            let len = self.page.get_int(pos);
            if len < 0 {
                return Err(LogError::Corrupt(format!(
                    "negative record length at {pos} in log block {blk}"
                )));
            }
            pos += BOUNDARY + len as usize;
        }
        self.positions.reverse();
        self.next_idx = 0;
        Ok(())
    }

    fn next_record(&mut self) -> Result<Option<Vec<u8>>, LogError> {
        while self.next_idx == self.positions.len() {
            if self.blk_num == self.last_blk_num {
                return Ok(None);
            }
            self.blk_num += 1;
            self.move_to_block()?;
        }
        let record = self.page.get_bytes(self.positions[self.next_idx])?.to_vec();
        self.next_idx += 1;
        Ok(Some(record))
    }
}

impl Iterator for LogIterator {
    type Item = Result<Vec<u8>, LogError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}
