//! Integration tests for Vetting-Crawler
//!
//! These tests use wiremock to stand in for real websites and drive the crawler
//! and the verification run end-to-end.

mod crawl_tests;
mod pipeline_tests;
