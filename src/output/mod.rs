//! Output module for audit reports
//!
//! This module handles:
//! - Formatting a plain-text score summary for the terminal
//! - Writing the full report as JSON

mod json;
mod summary;

pub use json::{read_json_report, write_json_report};
pub use summary::{format_summary, print_summary};
