//! Output module for verification reports
//!
//! This module handles:
//! - Writing the JSON report of a verification run
//! - Writing the human-readable markdown summary
//! - Printing today's governor usage for the CLI

mod json;
mod markdown;
mod usage;

pub use json::write_json_report;
pub use markdown::{format_markdown_summary, write_markdown_summary};
pub use usage::print_usage;
