//! Robots exclusion protocol handling
//!
//! A tolerant parser for robots.txt plus a per-domain policy cache with the
//! HTTP outcome mapping (401/403 gate everything, other 4xx gate nothing,
//! transport failures degrade to allow-all without failing the crawl).

mod parser;
mod policy;

pub use parser::{RequestRate, RobotsRules};
pub use policy::{DomainPolicy, DomainPolicyStore};
