//! # Ports
//!
//! - `inbound`: the archive API offered to the CLI
//! - `outbound`: store, audit, processing, replication and clock seams

pub mod inbound;
pub mod outbound;
