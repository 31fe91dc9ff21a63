//! File parsing modules
//!
//! Contains parsers for the documents fetched from remote sources.

pub mod feed_parser;

// Re-export commonly used parsers
pub use feed_parser::*;
