//! Database query modules.

pub mod catalog;
