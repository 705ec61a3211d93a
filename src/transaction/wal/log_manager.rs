use std::sync::Arc;

use log::{debug, trace};
use parking_lot::Mutex;
use thiserror::Error;

use crate::common::types::Lsn;
use crate::storage::disk::{FileManager, FileManagerError};
use crate::storage::page::{BlockId, Page, PageError};
use crate::transaction::wal::iterator::{LogIterator, LogReverseIterator};

#[derive(Error, Debug)]
pub enum LogError {
    #[error("I/O error: {0}")]
    Io(#[from] FileManagerError),

    #[error("corrupt log record: {0}")]
    Corrupt(String),

    #[error("log record of {size} bytes cannot fit a {block_size}-byte log block")]
    RecordTooLarge { size: usize, block_size: usize },
}

impl From<PageError> for LogError {
    fn from(e: PageError) -> Self {
        LogError::Corrupt(e.to_string())
    }
}

struct LogState {
    page: Page,
    current_block: BlockId,
    latest_lsn: Lsn,
    last_saved_lsn: Lsn,
}

/// The append-only log of one database.
///
/// One in-memory page acts as the current log tail. Records are written
/// right to left within the block: offset 0 holds the *boundary*, the
/// position of the most recently written record, and each record is
/// stored as a length-prefixed byte slice below the previous one. Storing
/// records backwards lets a full block be flushed as a unit and lets the
/// reverse iterator walk records newest-first without extra bookkeeping.
///
/// The log is a single append point; all mutation serializes on one
/// critical section by design.
pub struct LogManager {
    file_manager: Arc<FileManager>,
    logfile: String,
    state: Mutex<LogState>,
}

impl LogManager {
    /// Byte offset reserved at the head of every log block for the boundary.
    const BOUNDARY: usize = 4;

    /// Creates the manager for `logfile`, creating the file with an empty
    /// first block if it does not yet exist.
    pub fn new(file_manager: Arc<FileManager>, logfile: impl Into<String>) -> Result<Self, LogError> {
        let logfile = logfile.into();
        let block_size = file_manager.block_size();
        let mut page = Page::new(block_size);

        let log_blocks = file_manager.block_count(&logfile)?;
        let current_block = if log_blocks == 0 {
            Self::append_fresh_block(&file_manager, &logfile, &mut page)?
        } else {
            let blk = BlockId::new(logfile.clone(), log_blocks - 1);
            file_manager.read(&blk, &mut page)?;
            let boundary = page.get_int(0);
            if boundary < Self::BOUNDARY as i32 || boundary as usize > block_size {
                return Err(LogError::Corrupt(format!(
                    "bad boundary {boundary} in log tail block {blk}"
                )));
            }
            blk
        };

        Ok(Self {
            file_manager,
            logfile,
            state: Mutex::new(LogState {
                page,
                current_block,
                latest_lsn: 0,
                last_saved_lsn: 0,
            }),
        })
    }

    /// Append a record to the log tail and return its LSN. The record is
    /// not guaranteed durable until [`LogManager::flush_lsn`] (or a flush
    /// forced by a filled block) covers the returned LSN.
    pub fn append(&self, record: &[u8]) -> Result<Lsn, LogError> {
        let mut state = self.state.lock();

        let bytes_needed = record.len() + Self::BOUNDARY;
        if bytes_needed + Self::BOUNDARY > state.page.size() {
            return Err(LogError::RecordTooLarge {
                size: record.len(),
                block_size: state.page.size(),
            });
        }

        let mut boundary = state.page.get_int(0) as usize;
        if boundary < bytes_needed + Self::BOUNDARY {
            // the record doesn't fit, so flush and move to a new block
            self.flush_locked(&mut state)?;
            state.current_block =
                Self::append_fresh_block(&self.file_manager, &self.logfile, &mut state.page)?;
            boundary = state.page.get_int(0) as usize;
        }

        let record_pos = boundary - bytes_needed;
        state.page.set_bytes(record_pos, record);
        state.page.set_int(0, record_pos as i32); // the new boundary
        state.latest_lsn += 1;
        trace!("appended {} log bytes at lsn {}", record.len(), state.latest_lsn);
        Ok(state.latest_lsn)
    }

    /// Ensure the record with the given LSN, and every earlier record, is
    /// durable on disk.
    pub fn flush_lsn(&self, lsn: Lsn) -> Result<(), LogError> {
        let mut state = self.state.lock();
        if lsn > state.last_saved_lsn {
            self.flush_locked(&mut state)?;
        }
        Ok(())
    }

    /// Force the entire log tail durable.
    pub fn flush_all(&self) -> Result<(), LogError> {
        let mut state = self.state.lock();
        self.flush_locked(&mut state)
    }

    /// Iterate every log record, oldest to newest.
    pub fn iterator(&self) -> Result<LogIterator, LogError> {
        self.flush_all()?;
        let state = self.state.lock();
        LogIterator::new(
            self.file_manager.clone(),
            self.logfile.clone(),
            state.current_block.number(),
        )
    }

    /// Iterate every log record, newest to oldest, spanning block
    /// boundaries transparently. This is the mechanism rollback and
    /// recovery use to find the records to undo.
    pub fn reverse_iterator(&self) -> Result<LogReverseIterator, LogError> {
        self.flush_all()?;
        let state = self.state.lock();
        LogReverseIterator::new(self.file_manager.clone(), state.current_block.clone())
    }

    /// Drop all log history and restart the file with a single empty
    /// block. Callers must have made every dirty page durable first and
    /// must write a fresh checkpoint record afterwards, so recovery never
    /// needs the discarded records. LSNs keep increasing across a shrink.
    pub fn shrink(&self) -> Result<(), LogError> {
        let mut state = self.state.lock();
        self.file_manager.shrink(&self.logfile, 0)?;
        state.current_block =
            Self::append_fresh_block(&self.file_manager, &self.logfile, &mut state.page)?;
        state.last_saved_lsn = state.latest_lsn;
        debug!("log file {} truncated", self.logfile);
        Ok(())
    }

    pub fn latest_lsn(&self) -> Lsn {
        self.state.lock().latest_lsn
    }

    fn flush_locked(&self, state: &mut LogState) -> Result<(), LogError> {
        self.file_manager
            .write(&state.current_block, &state.page, true)?;
        trace!(
            "log flushed through lsn {} (block {})",
            state.latest_lsn, state.current_block
        );
        state.last_saved_lsn = state.latest_lsn;
        Ok(())
    }

    fn append_fresh_block(
        file_manager: &FileManager,
        logfile: &str,
        page: &mut Page,
    ) -> Result<BlockId, LogError> {
        let blk = file_manager.append(logfile)?;
        page.contents_mut().fill(0);
        page.set_int(0, file_manager.block_size() as i32);
        file_manager.write(&blk, page, true)?;
        Ok(blk)
    }
}
