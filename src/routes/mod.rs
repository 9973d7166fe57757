//! HTTP route handlers.

pub mod exchange;
pub mod health;
pub mod me;
pub mod msal_config;
