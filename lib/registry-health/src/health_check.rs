//! Health checking for registered endpoints

use registry_core::Endpoint;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time;
use tracing::{debug, warn};

/// Health check configuration
#[derive(Clone, Debug)]
pub struct HealthCheckConfig {
    /// HTTP path to check for health
    pub http_path: String,
    /// Delay between monitor cycles
    pub check_interval: Duration,
    /// Timeout for a single probe attempt
    pub timeout: Duration,
    /// Probe attempts per endpoint per cycle
    pub max_attempts: u32,
    /// Delay after a failed attempt before the next one
    pub retry_backoff: Duration,
    /// Consecutive failed cycles before an endpoint is evicted
    pub eviction_threshold: u32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            http_path: "/healthz".to_string(),
            check_interval: Duration::from_secs(10),
            timeout: Duration::from_secs(5),
            max_attempts: 4,
            retry_backoff: Duration::from_secs(3),
            eviction_threshold: 1,
        }
    }
}

/// Reasons a single probe attempt fails
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("non-success status {0}")]
    Status(u16),
}

/// A single liveness attempt against an endpoint
#[async_trait::async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, endpoint: &Endpoint) -> Result<(), ProbeError>;
}

#[async_trait::async_trait]
impl<P: Probe + ?Sized> Probe for Arc<P> {
    async fn probe(&self, endpoint: &Endpoint) -> Result<(), ProbeError> {
        (**self).probe(endpoint).await
    }
}

/// Probe that issues `GET http://{address}{path}`
pub struct HttpProbe {
    client: reqwest::Client,
    http_path: String,
    timeout: Duration,
}

impl HttpProbe {
    /// Create a new HTTP probe; `timeout` also bounds connection setup
    pub fn new(http_path: impl Into<String>, timeout: Duration) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| ProbeError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            http_path: http_path.into(),
            timeout,
        })
    }

    pub fn from_config(config: &HealthCheckConfig) -> Result<Self, ProbeError> {
        Self::new(config.http_path.clone(), config.timeout)
    }

    /// Build the liveness URL for an endpoint
    pub fn probe_url(&self, endpoint: &Endpoint) -> String {
        let path = if self.http_path.starts_with('/') {
            self.http_path.clone()
        } else {
            format!("/{}", self.http_path)
        };
        format!("http://{}{}", endpoint.address, path)
    }
}

#[async_trait::async_trait]
impl Probe for HttpProbe {
    async fn probe(&self, endpoint: &Endpoint) -> Result<(), ProbeError> {
        let url = self.probe_url(endpoint);
        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                ProbeError::Timeout(self.timeout)
            } else {
                ProbeError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ProbeError::Status(status.as_u16()))
        }
    }
}

/// Health checker applying the retry policy to a probe
pub struct HealthChecker<P> {
    probe: P,
    config: HealthCheckConfig,
}

impl<P: Probe> HealthChecker<P> {
    /// Create a new health checker
    pub fn new(probe: P, config: HealthCheckConfig) -> Self {
        Self { probe, config }
    }

    pub fn config(&self) -> &HealthCheckConfig {
        &self.config
    }

    /// Check if an endpoint is healthy, retrying failed attempts.
    ///
    /// Returns the number of failed attempts alongside the verdict.
    pub async fn check_endpoint(&self, endpoint: &Endpoint) -> (bool, u32) {
        let attempts = self.config.max_attempts.max(1);
        let mut failures = 0;

        for attempt in 1..=attempts {
            match time::timeout(self.config.timeout, self.probe.probe(endpoint)).await {
                Ok(Ok(())) => {
                    debug!(
                        "Endpoint {} at {} is healthy (attempt {}/{})",
                        endpoint.name, endpoint.address, attempt, attempts
                    );
                    return (true, failures);
                }
                Ok(Err(e)) => {
                    warn!(
                        "Endpoint {} at {} health check failed (attempt {}/{}): {}",
                        endpoint.name, endpoint.address, attempt, attempts, e
                    );
                }
                Err(_) => {
                    warn!(
                        "Endpoint {} at {} health check failed (attempt {}/{}): {}",
                        endpoint.name,
                        endpoint.address,
                        attempt,
                        attempts,
                        ProbeError::Timeout(self.config.timeout)
                    );
                }
            }

            failures += 1;
            if attempt < attempts {
                time::sleep(self.config.retry_backoff).await;
            }
        }

        (false, failures)
    }
}
