//! Database schema, connection setup and catalog records

pub mod catalog;
pub mod init;
pub mod models;
pub mod retry;
pub mod write_lock;

pub use init::*;
pub use models::*;
pub use retry::retry_on_lock;
pub use write_lock::ImmediateTransaction;
