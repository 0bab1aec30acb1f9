//! Client for the registry's registration endpoint

use crate::{AgentError, Result};
use registry_core::Endpoint;
use std::time::Duration;
use tracing::info;

/// RegistryClient performs registration calls against a service registry
pub struct RegistryClient {
    client: reqwest::Client,
    base_url: String,
}

impl RegistryClient {
    /// Create a client for the registry at `registry` (`host:port` or a URL)
    pub fn new(registry: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = if registry.contains("://") {
            registry.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", registry.trim_end_matches('/'))
        };
        Ok(Self { client, base_url })
    }

    pub fn register_url(&self) -> String {
        format!("{}/register", self.base_url)
    }

    /// Register an endpoint, failing on any non-success response
    pub async fn register(&self, endpoint: &Endpoint) -> Result<()> {
        let response = self
            .client
            .post(self.register_url())
            .json(endpoint)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AgentError::Registration(status.as_u16()));
        }

        info!("Registered endpoint [{}] with {}", endpoint.address, self.base_url);
        Ok(())
    }
}
