pub mod iterator;
pub mod log_manager;

pub use iterator::{LogIterator, LogReverseIterator};
pub use log_manager::{LogError, LogManager};
