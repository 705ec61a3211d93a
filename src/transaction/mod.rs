pub(crate) mod buffer_list;
pub mod checkpoint;
pub mod concurrency;
pub mod recovery;
pub mod transaction;
pub mod wal;

pub use transaction::{Transaction, TransactionError};
