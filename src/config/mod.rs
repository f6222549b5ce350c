//! Configuration module for Vetting-Crawler
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use vetting_crawler::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Daily search quota: {}", config.governor.daily_limit);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    Config, CrawlerConfig, GovernorConfig, OutputConfig, PipelineConfig, SearchConfig,
    UserAgentConfig, VerifierConfig,
};

pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
