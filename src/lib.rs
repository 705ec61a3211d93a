// Basalt Database Storage Engine

pub mod common;
pub mod db;
pub mod storage;
pub mod transaction;

// Re-export key items for convenient access
pub use db::{Database, DbConfig, DbError};
pub use storage::buffer::{BufferManager, BufferPoolError};
pub use storage::disk::{FileManager, FileManagerError};
pub use storage::page::{BlockId, Page, PageError};
pub use transaction::checkpoint::{ActiveRequestsCounter, Checkpoint, CheckpointError, RequestTicket};
pub use transaction::concurrency::{ConcurrencyManager, LockError, LockTable};
pub use transaction::recovery::{LogRecord, RecoveryManager};
pub use transaction::wal::{LogError, LogManager};
pub use transaction::{Transaction, TransactionError};
