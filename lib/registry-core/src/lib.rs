//! Core service directory functionality
//!
//! This library provides:
//! - The endpoint record shared by registrants, the registry and its monitor
//! - The in-memory service registry with its locking discipline
//! - Access provisioning hooks invoked on add and remove
//! - Prometheus metrics for the registry

pub mod endpoint;
pub mod error;
pub mod metrics;
pub mod provisioner;
pub mod registry;

pub use endpoint::Endpoint;
pub use error::{CoreError, Result};
pub use metrics::RegistryMetrics;
pub use provisioner::{AccessProvisioner, NoopProvisioner, WebhookProvisioner};
pub use registry::{Registration, ServiceRegistry, DEFAULT_PROVISION_TIMEOUT};
