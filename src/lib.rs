//! SoulHeal library
//!
//! Resilient element resolution and self-healing for UI test steps. The
//! subsystem crates are re-exported here together with the configuration and
//! session wiring used by the `soulheal` binary.

pub mod config;
pub mod errors;
pub mod session;

pub use action_flow as flow;
pub use action_locator as locator;
pub use llm_backend as backend;
pub use perceiver_structural as perceiver;
pub use selector_registry as registry;

pub use config::HealConfig;
pub use errors::SoulHealError;
pub use session::HealSession;
