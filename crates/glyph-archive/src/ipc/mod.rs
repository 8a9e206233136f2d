//! # Module IPC
//!
//! JSON over stdin/stdout to an external processing executable.
//!
//! - `messages`: request and reply types, size ceiling
//! - `channel`: subprocess lifecycle with timeout

mod channel;
mod messages;

pub use channel::ModuleChannel;
pub use messages::{ModuleReply, ModuleRequest, AUTH_FAILURE_PREFIX, MAX_IPC_PAYLOAD_BYTES};
