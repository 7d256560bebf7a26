//! # Stackpark
//!
//! Operational backbone of a multi-site mechanical-parking network: pallet
//! allocation and occupancy, booking lifecycle with retrieval OTPs,
//! customer-level memberships, and multi-tenant site scoping.
//!
//! ## Architecture
//!
//! - **shared**: Cross-cutting utilities (errors, pagination, identifiers,
//!   validation, shutdown)
//! - **domain**: Core business entities and their invariants
//! - **storage**: Persistence seam (async trait + in-memory engine)
//! - **services**: Use-case orchestration (pallet engine, booking engine,
//!   membership engine, site administration)
//! - **auth**: Credential utilities and the request authorization envelope
//! - **api**: Delivery (axum handlers, DTOs, router, Swagger UI)
//! - **config**: Environment-driven configuration

pub mod api;
pub mod auth;
pub mod config;
pub mod domain;
pub mod server;
pub mod services;
pub mod shared;
pub mod storage;

// Re-export commonly used types at crate root
pub use api::{create_api_router, AppState};
pub use config::Config;
pub use shared::types::{DomainError, DomainResult};
pub use storage::{InMemoryStorage, Storage};
