//! HTTP surface: router, auth middleware and handlers

mod avatars;
mod chat;
mod conversations;
pub mod error;
mod legacy;
mod memories;
pub mod middleware;
mod onboarding;
pub mod routes;
mod shares;
mod voice;

pub use routes::build_router;
