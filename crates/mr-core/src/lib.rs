//! mr-core: shared types, IDs, errors, configuration, and range planning.
//!
//! This crate is the foundational dependency for all other mr-* crates. It
//! has no I/O of its own apart from reading the configuration file, which
//! keeps the range arithmetic testable in isolation.

pub mod config;
pub mod error;
pub mod ids;
pub mod media;
pub mod range;

// Re-export the most commonly used items at the crate root.
pub use error::{DisconnectKind, Error, Result};
pub use ids::*;
pub use media::*;
pub use range::{plan, ByteRange, RangeWindow, DEFAULT_CHUNK_SIZE};
