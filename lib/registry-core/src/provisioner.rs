//! Access provisioning hooks invoked when endpoints join or leave the directory

use crate::Endpoint;
use anyhow::{anyhow, Result};
use std::time::Duration;
use tracing::debug;

/// Opens and closes network access for registered endpoints.
///
/// Both hooks must be idempotent. They are called outside the directory lock
/// and their failures are logged by the registry, never propagated.
#[async_trait::async_trait]
pub trait AccessProvisioner: Send + Sync {
    /// Name used in log lines
    fn name(&self) -> &'static str {
        "UnnamedProvisioner"
    }

    /// Called after an endpoint is added or changed
    async fn grant(&self, endpoint: &Endpoint) -> Result<()>;

    /// Called after an endpoint is removed
    async fn revoke(&self, name: &str) -> Result<()>;
}

/// Provisioner that does nothing
pub struct NoopProvisioner;

#[async_trait::async_trait]
impl AccessProvisioner for NoopProvisioner {
    fn name(&self) -> &'static str {
        "NoopProvisioner"
    }

    async fn grant(&self, endpoint: &Endpoint) -> Result<()> {
        debug!("No provisioner configured, skipping grant for {}", endpoint.name);
        Ok(())
    }

    async fn revoke(&self, name: &str) -> Result<()> {
        debug!("No provisioner configured, skipping revoke for {}", name);
        Ok(())
    }
}

/// Provisioner that delegates to an external HTTP service.
///
/// Sends `POST {base}/grant` with the endpoint as JSON and
/// `POST {base}/revoke` with `{"name": ...}`.
pub struct WebhookProvisioner {
    client: reqwest::Client,
    base_url: String,
}

impl WebhookProvisioner {
    /// Create a new webhook provisioner; `timeout` bounds each call
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn hook_url(&self, hook: &str) -> String {
        format!("{}/{}", self.base_url, hook)
    }

    async fn post(&self, hook: &str, body: &serde_json::Value) -> Result<()> {
        let url = self.hook_url(hook);
        let response = self.client.post(&url).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("{} returned {}", url, status));
        }
        debug!("{} succeeded", url);
        Ok(())
    }
}

#[async_trait::async_trait]
impl AccessProvisioner for WebhookProvisioner {
    fn name(&self) -> &'static str {
        "WebhookProvisioner"
    }

    async fn grant(&self, endpoint: &Endpoint) -> Result<()> {
        self.post("grant", &serde_json::to_value(endpoint)?).await
    }

    async fn revoke(&self, name: &str) -> Result<()> {
        self.post("revoke", &serde_json::json!({ "name": name })).await
    }
}
