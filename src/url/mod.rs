//! URL handling module for Vetting-Crawler
//!
//! Normalization produces the keys of a crawl's visited set; the domain helpers
//! decide which links stay inside the seed's site and where robots policy is cached.

mod domain;
mod normalize;

pub use domain::{extract_domain, origin_key, same_domain};
pub use normalize::normalize_url;
