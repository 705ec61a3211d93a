pub mod buffer;
pub mod error;
pub mod manager;

pub use buffer::Buffer;
pub use error::BufferPoolError;
pub use manager::BufferManager;
