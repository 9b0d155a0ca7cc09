pub mod app;
pub mod cache;
pub mod classify;
pub mod commands;
pub mod context;
pub mod dispatch;
pub mod env;
pub mod heal;
pub mod health;
pub mod output;
pub mod registry;
pub mod rescan;
pub mod resolve;
pub mod runtime;
