//! URL handling: canonicalization, identity, scope, and path filtering
//!
//! Everything the crawler knows about URL equivalence lives here. Dedup and
//! cache keys are always derived from the fully normalized form, so the
//! correctness of the whole deduplication layer rests on this module.

mod identity;
mod normalize;
mod patterns;
mod scope;

pub use identity::identity_hash;
pub(crate) use normalize::normalize_percent_encoding;
pub use normalize::normalize_url;
pub use patterns::PathFilter;
pub use scope::{DomainScope, ScopeFilter};
