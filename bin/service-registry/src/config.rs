//! Command line and environment configuration

use clap::Parser;
use registry_health::HealthCheckConfig;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "service-registry")]
#[command(about = "Directory of self-registering endpoints with liveness eviction")]
#[command(version)]
pub struct Cli {
    /// HTTP listen address
    #[arg(long, env = "REGISTRY_LISTEN_ADDR", default_value = "127.0.0.1:8888")]
    pub listen_addr: SocketAddr,

    /// Liveness path probed on every endpoint
    #[arg(long, env = "REGISTRY_PROBE_PATH", default_value = "/healthz")]
    pub probe_path: String,

    /// Seconds between health check cycles
    #[arg(long, env = "REGISTRY_PROBE_INTERVAL_SECS", default_value_t = 10)]
    pub probe_interval_secs: u64,

    /// Timeout for a single probe attempt, in seconds
    #[arg(long, env = "REGISTRY_PROBE_TIMEOUT_SECS", default_value_t = 5,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub probe_timeout_secs: u64,

    /// Probe attempts per endpoint per cycle
    #[arg(long, env = "REGISTRY_PROBE_ATTEMPTS", default_value_t = 4,
          value_parser = clap::value_parser!(u32).range(1..))]
    pub probe_attempts: u32,

    /// Seconds to wait after a failed attempt
    #[arg(long, env = "REGISTRY_PROBE_BACKOFF_SECS", default_value_t = 3)]
    pub probe_backoff_secs: u64,

    /// Consecutive failed cycles before an endpoint is evicted
    #[arg(long, env = "REGISTRY_EVICTION_THRESHOLD", default_value_t = 1,
          value_parser = clap::value_parser!(u32).range(1..))]
    pub eviction_threshold: u32,

    /// Base URL of an access provisioning webhook (grant/revoke)
    #[arg(long, env = "REGISTRY_PROVISIONER_URL")]
    pub provisioner_url: Option<String>,

    /// Timeout for a single provisioning call, in seconds
    #[arg(long, env = "REGISTRY_PROVISION_TIMEOUT_SECS", default_value_t = 10,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub provision_timeout_secs: u64,

    /// Emit logs as JSON
    #[arg(long, env = "REGISTRY_LOG_JSON")]
    pub log_json: bool,
}

impl Cli {
    pub fn health_check_config(&self) -> HealthCheckConfig {
        HealthCheckConfig {
            http_path: self.probe_path.clone(),
            check_interval: Duration::from_secs(self.probe_interval_secs),
            timeout: Duration::from_secs(self.probe_timeout_secs),
            max_attempts: self.probe_attempts,
            retry_backoff: Duration::from_secs(self.probe_backoff_secs),
            eviction_threshold: self.eviction_threshold,
        }
    }

    pub fn provision_timeout(&self) -> Duration {
        Duration::from_secs(self.provision_timeout_secs)
    }
}
