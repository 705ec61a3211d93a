use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;
use thiserror::Error;

use crate::storage::page::{BlockId, Page};

#[derive(Error, Debug)]
pub enum FileManagerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Thread-safe block I/O over the named files of one database directory.
///
/// Block N of a file lives at byte offset `N * block_size`. Files are
/// opened lazily on first access and kept open for the manager's lifetime;
/// operations on the same file serialize on a per-file mutex, distinct
/// files proceed independently.
pub struct FileManager {
    db_dir: PathBuf,
    block_size: usize,
    is_new: bool,
    open_files: Mutex<HashMap<String, Arc<Mutex<File>>>>,
}

impl FileManager {
    pub fn new(
        db_dir: impl Into<PathBuf>,
        block_size: usize,
        recreate: bool,
    ) -> Result<Self, FileManagerError> {
        let db_dir = db_dir.into();

        if recreate && db_dir.exists() {
            fs::remove_dir_all(&db_dir)?;
        }

        let is_new = !db_dir.exists();
        if is_new {
            fs::create_dir_all(&db_dir)?;
        }

        // remove any leftover temporary tables
        for entry in fs::read_dir(&db_dir)? {
            let entry = entry?;
            if entry.file_name().to_string_lossy().starts_with("temp") {
                fs::remove_file(entry.path())?;
            }
        }

        Ok(Self {
            db_dir,
            block_size,
            is_new,
            open_files: Mutex::new(HashMap::new()),
        })
    }

    /// Read the block into `page`. Reading past the end of the file yields
    /// a zeroed page, which is the content of a freshly appended block.
    pub fn read(&self, blk: &BlockId, page: &mut Page) -> Result<(), FileManagerError> {
        let file = self.file(blk.filename())?;
        let mut file = file.lock();

        let offset = blk.number() * self.block_size as u64;
        let file_size = file.metadata()?.len();
        if offset >= file_size {
            page.contents_mut().fill(0);
            return Ok(());
        }

        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(page.contents_mut())?;
        Ok(())
    }

    /// Write `page` to the block. With `sync` the write is forced to
    /// stable storage before returning, which log-tail and commit-critical
    /// writes rely on; without it the OS may buffer.
    pub fn write(&self, blk: &BlockId, page: &Page, sync: bool) -> Result<(), FileManagerError> {
        let file = self.file(blk.filename())?;
        let mut file = file.lock();

        file.seek(SeekFrom::Start(blk.number() * self.block_size as u64))?;
        file.write_all(page.contents())?;
        if sync {
            file.sync_data()?;
        }
        Ok(())
    }

    /// Extend the file by one zeroed block and return its id.
    pub fn append(&self, filename: &str) -> Result<BlockId, FileManagerError> {
        let file = self.file(filename)?;
        let mut file = file.lock();

        let block_num = file.metadata()?.len() / self.block_size as u64;
        let blk = BlockId::new(filename, block_num);

        file.seek(SeekFrom::Start(block_num * self.block_size as u64))?;
        file.write_all(&vec![0; self.block_size])?;
        file.sync_data()?;

        debug!("appended block {blk}");
        Ok(blk)
    }

    pub fn block_count(&self, filename: &str) -> Result<u64, FileManagerError> {
        let file = self.file(filename)?;
        let file = file.lock();
        Ok(file.metadata()?.len() / self.block_size as u64)
    }

    /// Open (or create) the file eagerly instead of on first block access.
    pub fn open_file(&self, filename: &str) -> Result<(), FileManagerError> {
        self.file(filename).map(|_| ())
    }

    /// Truncate the file to `to_blocks` blocks. Only ever used on the
    /// append-only log file once its history is no longer needed for
    /// recovery; never on data files with live content.
    pub fn shrink(&self, filename: &str, to_blocks: u64) -> Result<(), FileManagerError> {
        let file = self.file(filename)?;
        let file = file.lock();
        file.set_len(to_blocks * self.block_size as u64)?;
        file.sync_data()?;
        debug!("shrank {filename} to {to_blocks} blocks");
        Ok(())
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Whether the database directory was created by this manager.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    fn file(&self, filename: &str) -> Result<Arc<Mutex<File>>, FileManagerError> {
        let mut open_files = self.open_files.lock();
        if let Some(file) = open_files.get(filename) {
            return Ok(file.clone());
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(self.db_dir.join(filename))?;
        let file = Arc::new(Mutex::new(file));
        open_files.insert(filename.to_string(), file.clone());
        Ok(file)
    }
}
