//! # Domain Layer
//!
//! Pure types and functions: entities, errors, algorithms, the audit chain
//! and destination placement. No component here owns a file handle or a
//! database connection.

pub mod algorithms;
pub mod audit;
pub mod config;
pub mod digest;
pub mod entities;
pub mod errors;
pub mod placement;
