//! HTTP delivery: DTOs, handlers, router

pub mod common;
pub mod dto;
pub mod handlers;
pub mod metrics;
pub mod router;

pub use router::{create_api_router, ApiDoc, AppState};
