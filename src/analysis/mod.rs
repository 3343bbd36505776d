//! Batch statistics.

pub mod aggregator;

pub use aggregator::*;
