//! Request/response DTOs

pub mod booking;
pub mod common;
pub mod customer;
pub mod machine;
pub mod site;

pub use booking::*;
pub use common::*;
pub use customer::*;
pub use machine::*;
pub use site::*;
