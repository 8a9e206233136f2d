//! Audit log adapters.
//!
//! - `file`: JSON-lines log (`FileAuditLog`)
//! - `lock`: exclusive append lock shared by concurrent writers

mod file;
mod lock;

pub use file::FileAuditLog;
pub use lock::AppendLock;
