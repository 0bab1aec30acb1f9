//! Registrant-side support
//!
//! - Metadata server lookups for the instance's own address and tags
//! - Resolution of the advertised address from flags and metadata
//! - The one-shot registration call against the registry
pub mod advertise;
pub mod client;
pub mod error;
pub mod metadata;

pub use advertise::{resolve_advertisement, AdvertiseConfig};
pub use client::RegistryClient;
pub use error::{AgentError, Result};
pub use metadata::{MetadataClient, MetadataSource};
