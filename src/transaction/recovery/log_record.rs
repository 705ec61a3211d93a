use std::fmt;

use crate::common::types::{Lsn, TxNum};
use crate::storage::page::{BlockId, Page};
use crate::transaction::wal::{LogError, LogManager};

const TAG_CHECKPOINT: i32 = 0;
const TAG_START: i32 = 1;
const TAG_COMMIT: i32 = 2;
const TAG_ROLLBACK: i32 = 3;
const TAG_SET_INT: i32 = 4;
const TAG_SET_STRING: i32 = 5;
const TAG_SET_BYTES: i32 = 6;

const TAG_SIZE: usize = 4;
const TX_SIZE: usize = 8;

/// A log record, written as a self-describing byte slice with a leading
/// type tag. The `Set*` variants carry the *old* value at the written
/// offset: exactly what undo needs and nothing more. New values are never
/// logged; recovery is undo-only by design.
#[derive(Debug, Clone, PartialEq)]
pub enum LogRecord {
    /// Quiescent checkpoint; recovery stops here. Carries the
    /// transactions active when the checkpoint was taken (empty for the
    /// quiescent checkpoints this system writes).
    Checkpoint { active: Vec<TxNum> },
    Start {
        tx: TxNum,
    },
    Commit {
        tx: TxNum,
    },
    Rollback {
        tx: TxNum,
    },
    SetInt {
        tx: TxNum,
        blk: BlockId,
        offset: usize,
        old: i32,
    },
    SetString {
        tx: TxNum,
        blk: BlockId,
        offset: usize,
        old: String,
    },
    SetBytes {
        tx: TxNum,
        blk: BlockId,
        offset: usize,
        old: Vec<u8>,
    },
}

impl LogRecord {
    /// The transaction the record belongs to; checkpoints belong to none.
    pub fn tx_num(&self) -> Option<TxNum> {
        match self {
            LogRecord::Checkpoint { .. } => None,
            LogRecord::Start { tx }
            | LogRecord::Commit { tx }
            | LogRecord::Rollback { tx }
            | LogRecord::SetInt { tx, .. }
            | LogRecord::SetString { tx, .. }
            | LogRecord::SetBytes { tx, .. } => Some(*tx),
        }
    }

    /// Append this record to the log, returning its LSN. Durability is
    /// the caller's concern.
    pub fn write_to(&self, log: &LogManager) -> Result<Lsn, LogError> {
        log.append(&self.to_bytes())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            LogRecord::Checkpoint { active } => {
                let size = TAG_SIZE + 4 + active.len() * TX_SIZE;
                let mut page = Page::new(size);
                page.set_int(0, TAG_CHECKPOINT);
                page.set_int(TAG_SIZE, active.len() as i32);
                for (i, tx) in active.iter().enumerate() {
                    page.set_u64(TAG_SIZE + 4 + i * TX_SIZE, *tx);
                }
                page.contents().to_vec()
            }
            LogRecord::Start { tx } => Self::tx_only_bytes(TAG_START, *tx),
            LogRecord::Commit { tx } => Self::tx_only_bytes(TAG_COMMIT, *tx),
            LogRecord::Rollback { tx } => Self::tx_only_bytes(TAG_ROLLBACK, *tx),
            LogRecord::SetInt {
                tx,
                blk,
                offset,
                old,
            } => {
                let (mut page, value_pos) = Self::set_header(TAG_SET_INT, *tx, blk, *offset, 4);
                page.set_int(value_pos, *old);
                page.contents().to_vec()
            }
            LogRecord::SetString {
                tx,
                blk,
                offset,
                old,
            } => {
                let (mut page, value_pos) = Self::set_header(
                    TAG_SET_STRING,
                    *tx,
                    blk,
                    *offset,
                    Page::max_length(old.len()),
                );
                page.set_string(value_pos, old);
                page.contents().to_vec()
            }
            LogRecord::SetBytes {
                tx,
                blk,
                offset,
                old,
            } => {
                let (mut page, value_pos) = Self::set_header(
                    TAG_SET_BYTES,
                    *tx,
                    blk,
                    *offset,
                    Page::max_length(old.len()),
                );
                page.set_bytes(value_pos, old);
                page.contents().to_vec()
            }
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LogError> {
        if bytes.len() < TAG_SIZE {
            return Err(LogError::Corrupt("log record shorter than its tag".into()));
        }
        let page = Page::from_bytes(bytes.to_vec());
        match page.get_int(0) {
            TAG_CHECKPOINT => {
                Self::ensure_len(&page, TAG_SIZE + 4)?;
                let count = page.get_int(TAG_SIZE);
                if count < 0 {
                    return Err(LogError::Corrupt(format!(
                        "checkpoint record with negative active count {count}"
                    )));
                }
                Self::ensure_len(&page, TAG_SIZE + 4 + count as usize * TX_SIZE)?;
                let mut active = Vec::with_capacity(count as usize);
                for i in 0..count as usize {
                    active.push(page.get_u64(TAG_SIZE + 4 + i * TX_SIZE));
                }
                Ok(LogRecord::Checkpoint { active })
            }
            TAG_START => {
                Self::ensure_len(&page, TAG_SIZE + TX_SIZE)?;
                Ok(LogRecord::Start {
                    tx: page.get_u64(TAG_SIZE),
                })
            }
            TAG_COMMIT => {
                Self::ensure_len(&page, TAG_SIZE + TX_SIZE)?;
                Ok(LogRecord::Commit {
                    tx: page.get_u64(TAG_SIZE),
                })
            }
            TAG_ROLLBACK => {
                Self::ensure_len(&page, TAG_SIZE + TX_SIZE)?;
                Ok(LogRecord::Rollback {
                    tx: page.get_u64(TAG_SIZE),
                })
            }
            TAG_SET_INT => {
                let (tx, blk, offset, value_pos) = Self::read_set_header(&page)?;
                Self::ensure_len(&page, value_pos + 4)?;
                Ok(LogRecord::SetInt {
                    tx,
                    blk,
                    offset,
                    old: page.get_int(value_pos),
                })
            }
            TAG_SET_STRING => {
                let (tx, blk, offset, value_pos) = Self::read_set_header(&page)?;
                Ok(LogRecord::SetString {
                    tx,
                    blk,
                    offset,
                    old: page.get_string(value_pos)?,
                })
            }
            TAG_SET_BYTES => {
                let (tx, blk, offset, value_pos) = Self::read_set_header(&page)?;
                Ok(LogRecord::SetBytes {
                    tx,
                    blk,
                    offset,
                    old: page.get_bytes(value_pos)?.to_vec(),
                })
            }
            tag => Err(LogError::Corrupt(format!("unknown log record tag {tag}"))),
        }
    }

    // Fixed-width accessors panic past the end of the buffer, so every
    // decode path proves the record is long enough before reading.
    fn ensure_len(page: &Page, needed: usize) -> Result<(), LogError> {
        if page.size() < needed {
            return Err(LogError::Corrupt(format!(
                "log record of {} bytes is shorter than its layout requires ({needed})",
                page.size()
            )));
        }
        Ok(())
    }

    // START/COMMIT/ROLLBACK share a tag + transaction number layout.
    fn tx_only_bytes(tag: i32, tx: TxNum) -> Vec<u8> {
        let mut page = Page::new(TAG_SIZE + TX_SIZE);
        page.set_int(0, tag);
        page.set_u64(TAG_SIZE, tx);
        page.contents().to_vec()
    }

    // Layout shared by the Set* records:
    // tag | txnum | filename | block number | offset | old value
    fn set_header(
        tag: i32,
        tx: TxNum,
        blk: &BlockId,
        offset: usize,
        value_size: usize,
    ) -> (Page, usize) {
        let file_pos = TAG_SIZE + TX_SIZE;
        let blk_pos = file_pos + Page::max_length(blk.filename().len());
        let offset_pos = blk_pos + 8;
        let value_pos = offset_pos + 4;

        let mut page = Page::new(value_pos + value_size);
        page.set_int(0, tag);
        page.set_u64(TAG_SIZE, tx);
        page.set_string(file_pos, blk.filename());
        page.set_u64(blk_pos, blk.number());
        page.set_int(offset_pos, offset as i32);
        (page, value_pos)
    }

    fn read_set_header(page: &Page) -> Result<(TxNum, BlockId, usize, usize), LogError> {
        Self::ensure_len(page, TAG_SIZE + TX_SIZE)?;
        let tx = page.get_u64(TAG_SIZE);
        let file_pos = TAG_SIZE + TX_SIZE;
        let filename = page.get_string(file_pos)?;
        let blk_pos = file_pos + Page::max_length(filename.len());
        let offset_pos = blk_pos + 8;
        Self::ensure_len(page, offset_pos + 4)?;
        let blk_num = page.get_u64(blk_pos);
        let offset = page.get_int(offset_pos);
        if offset < 0 {
            return Err(LogError::Corrupt(format!(
                "set record with negative offset {offset}"
            )));
        }
        Ok((
            tx,
            BlockId::new(filename, blk_num),
            offset as usize,
            offset_pos + 4,
        ))
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogRecord::Checkpoint { active } => write!(f, "<CHECKPOINT {active:?}>"),
            LogRecord::Start { tx } => write!(f, "<START {tx}>"),
            LogRecord::Commit { tx } => write!(f, "<COMMIT {tx}>"),
            LogRecord::Rollback { tx } => write!(f, "<ROLLBACK {tx}>"),
            LogRecord::SetInt {
                tx,
                blk,
                offset,
                old,
            } => write!(f, "<SETINT {tx} {blk} {offset} {old}>"),
            LogRecord::SetString {
                tx,
                blk,
                offset,
                old,
            } => write!(f, "<SETSTRING {tx} {blk} {offset} {old:?}>"),
            LogRecord::SetBytes { tx, blk, offset, .. } => {
                write!(f, "<SETBYTES {tx} {blk} {offset}>")
            }
        }
    }
}
