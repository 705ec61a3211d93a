use thiserror::Error;

use crate::storage::disk::FileManagerError;
use crate::transaction::wal::LogError;

#[derive(Error, Debug)]
pub enum BufferPoolError {
    #[error("no buffer became available within the pin wait limit")]
    PoolExhausted,

    #[error("I/O error: {0}")]
    Io(#[from] FileManagerError),

    #[error("log error: {0}")]
    Log(#[from] LogError),
}
