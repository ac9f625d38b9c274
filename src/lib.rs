//! Launchpad: multi-role onboarding and dashboards for a startup platform.

pub mod accounts;
pub mod app;
pub mod config;
pub mod error;
pub mod flows;
pub mod llm;
pub mod onboarding;
pub mod store;
