pub mod concurrency_manager;
pub mod lock_table;

pub use concurrency_manager::ConcurrencyManager;
pub use lock_table::{LockError, LockTable};
