//! Dotted numeric firmware versions
//!
//! - [`comparator`]: parsing, ordering and sorting of version strings

pub mod comparator;

pub use comparator::{ParseError, Version, compare_versions, sort_versions};
