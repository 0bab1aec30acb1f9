//! HTTP surface of the service registry
//!
//! Accepts registrations and renders the directory as HTML or JSON.
pub mod api;
pub mod error;
pub mod payload;
pub mod render;

pub use api::RegistryApi;
pub use error::ApiError;
pub use payload::parse_registration;
