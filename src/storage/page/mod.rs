pub mod block_id;
pub mod page;

pub use block_id::BlockId;
pub use page::{Page, PageError};
