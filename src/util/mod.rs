//! Shared utilities

pub mod json;
pub mod rate_limit;
pub mod time;
