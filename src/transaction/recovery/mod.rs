pub mod log_record;
pub mod recovery_manager;

pub use log_record::LogRecord;
pub use recovery_manager::RecoveryManager;
