//! Guarded step execution with self-healing
//!
//! This crate wraps element-driven operations with:
//! - Failure classification from raw error text
//! - A healing orchestrator that re-scans pages or patches registry selectors
//! - A retry executor that heals between attempts within a per-scenario budget

pub mod classifier;
pub mod context;
pub mod errors;
pub mod executor;
pub mod healer;
pub mod heuristics;
pub mod suggest;
pub mod types;

pub use classifier::{classify, ErrorKind};
pub use context::ScenarioContext;
pub use errors::*;
pub use executor::RetryExecutor;
pub use healer::{HealingOrchestrator, SelfHealer};
pub use heuristics::{heuristic_match, HeuristicMatch};
pub use suggest::{healing_prompt, parse_selector_reply};
pub use types::*;
