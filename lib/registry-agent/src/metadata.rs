//! Instance metadata lookups

use crate::{AgentError, Result};
use std::net::IpAddr;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_METADATA_HOST: &str = "http://metadata.google.internal";

const INTERNAL_IP_PATH: &str = "/computeMetadata/v1/instance/network-interfaces/0/ip";
const EXTERNAL_IP_PATH: &str =
    "/computeMetadata/v1/instance/network-interfaces/0/access-configs/0/external-ip";
const TAGS_PATH: &str = "/computeMetadata/v1/instance/tags";

/// Environment-provided facts about the instance a registrant runs on
#[async_trait::async_trait]
pub trait MetadataSource: Send + Sync {
    async fn internal_ip(&self) -> Result<IpAddr>;
    async fn external_ip(&self) -> Result<IpAddr>;
    async fn tags(&self) -> Result<Vec<String>>;
}

/// MetadataClient reads the compute metadata server
pub struct MetadataClient {
    client: reqwest::Client,
    host: String,
}

impl MetadataClient {
    /// Create a new metadata client against `host` (scheme included)
    pub fn new(host: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            host: host.into().trim_end_matches('/').to_string(),
        })
    }

    async fn get(&self, path: &str) -> Result<String> {
        let url = format!("{}{}", self.host, path);
        let response = self
            .client
            .get(&url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AgentError::Metadata {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }

        let value = response.text().await?;
        debug!("Metadata {} = {:?}", path, value);
        Ok(value)
    }

    async fn get_ip(&self, path: &str) -> Result<IpAddr> {
        let value = self.get(path).await?;
        value
            .trim()
            .parse()
            .map_err(|e: std::net::AddrParseError| AgentError::MalformedMetadata {
                path: path.to_string(),
                reason: e.to_string(),
            })
    }
}

#[async_trait::async_trait]
impl MetadataSource for MetadataClient {
    async fn internal_ip(&self) -> Result<IpAddr> {
        self.get_ip(INTERNAL_IP_PATH).await
    }

    async fn external_ip(&self) -> Result<IpAddr> {
        self.get_ip(EXTERNAL_IP_PATH).await
    }

    async fn tags(&self) -> Result<Vec<String>> {
        let value = self.get(TAGS_PATH).await?;
        serde_json::from_str(&value).map_err(|e| AgentError::MalformedMetadata {
            path: TAGS_PATH.to_string(),
            reason: e.to_string(),
        })
    }
}
