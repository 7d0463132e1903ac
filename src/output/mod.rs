//! Output module for rehost reports
//!
//! This module handles:
//! - Rendering per-document processing reports
//! - Computing and printing run-wide statistics

pub mod stats;

pub use stats::{compute_statistics, format_report, print_report, print_summary, RunStatistics};
