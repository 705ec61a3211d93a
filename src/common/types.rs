use std::sync::Arc;

use parking_lot::Mutex;

/// Transaction number type. Process-unique, monotonically increasing,
/// never reused.
pub type TxNum = u64;

/// Log sequence number type. Strictly increasing within a log manager;
/// orders log durability against data-page durability.
pub type Lsn = u64;

/// Smart pointer to a buffer pool frame.
pub type BufferRef = Arc<Mutex<crate::storage::buffer::Buffer>>;
