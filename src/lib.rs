//! HireFlow: multi-tenant job search backend with AI-assisted matching and
//! behavioral analytics.

pub mod accounts;
pub mod ai_client;
pub mod analytics;
pub mod applications;
pub mod auth;
pub mod core;
pub mod error;
pub mod jobs;
pub mod matching;
pub mod resumes;
pub mod tenant_cli;
pub mod utils;
pub mod web;

#[cfg(test)]
mod test_support;

pub use web::{build_rocket, start_web_server};
