//! Locator - description-driven element resolution
//!
//! This crate turns a fuzzy element description into exactly one visible element:
//! - Ranked strategy generation (id, test id, ARIA, placeholder, role, text XPath,
//!   type CSS, composite and fuzzy XPath, optional AI suggestion)
//! - Learning strategy cache keyed by description fingerprint, persisted as JSON
//! - Resolver that tries cached strategies before generating new ones

pub mod cache;
pub mod errors;
pub mod fingerprint;
pub mod resolver;
pub mod strategies;
pub mod types;

pub use cache::{CachePolicy, CacheStats, StrategyCache, StrategyCacheEntry};
pub use errors::*;
pub use fingerprint::{sanitize, Fingerprint};
pub use resolver::{DefaultElementResolver, ElementResolver};
pub use strategies::{deterministic_strategies, DefaultStrategyGenerator, StrategyGenerator};
pub use types::*;
