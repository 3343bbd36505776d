//! Art Insight library.
//!
//! Sends a batch of artwork images to a vision model, validates the
//! structured answers and builds reports and a force-directed relationship
//! graph from them. The `artinsight` binary is a thin CLI over these modules.

pub mod analysis;
pub mod batch;
pub mod cli;
pub mod config;
pub mod error;
pub mod graph;
pub mod models;
pub mod oracle;
pub mod report;
pub mod scanner;
