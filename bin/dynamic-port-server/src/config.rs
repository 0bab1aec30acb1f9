//! Command line and environment configuration

use clap::Parser;
use registry_agent::metadata::DEFAULT_METADATA_HOST;
use registry_agent::AdvertiseConfig;
use std::net::IpAddr;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "dynamic-port-server")]
#[command(about = "Serves on an ephemeral port and registers itself with a service registry")]
#[command(version)]
pub struct Cli {
    /// The unique service instance name
    #[arg(long, env = "SERVICE_INSTANCE_NAME")]
    pub service_instance_name: String,

    /// The remote service registry address
    #[arg(long, env = "SERVICE_REGISTRY", default_value = "127.0.0.1:8888")]
    pub service_registry: String,

    /// The advertised IP address to register
    #[arg(long, env = "ADVERTISED_IP")]
    pub advertised_ip: Option<IpAddr>,

    /// Register the external IP address of the compute instance
    #[arg(long)]
    pub register_instance_external_ip: bool,

    /// Tag to register; repeatable. Tags are read from metadata when none are given
    #[arg(long = "tag", env = "SERVICE_TAGS", value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Never query the metadata server
    #[arg(long, conflicts_with = "register_instance_external_ip")]
    pub no_metadata: bool,

    /// Metadata server base URL
    #[arg(long, env = "METADATA_HOST", default_value = DEFAULT_METADATA_HOST)]
    pub metadata_host: String,

    /// IP address to bind the ephemeral listener on
    #[arg(long, default_value = "0.0.0.0")]
    pub listen_ip: IpAddr,

    /// Timeout for metadata and registration calls, in seconds
    #[arg(long, default_value_t = 5)]
    pub request_timeout_secs: u64,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,
}

impl Cli {
    pub fn advertise_config(&self) -> AdvertiseConfig {
        AdvertiseConfig {
            name: self.service_instance_name.clone(),
            advertised_ip: self.advertised_ip,
            use_external_ip: self.register_instance_external_ip,
            tags: self.tags.clone(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["dynamic-port-server", "--service-instance-name", "svc-a"])
            .unwrap();
        assert_eq!(cli.service_registry, "127.0.0.1:8888");
        assert_eq!(cli.metadata_host, DEFAULT_METADATA_HOST);
        assert!(cli.tags.is_empty());
        assert!(!cli.no_metadata);
        assert_eq!(cli.listen_ip, "0.0.0.0".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_tags_and_advertised_ip() {
        let cli = Cli::try_parse_from([
            "dynamic-port-server",
            "--service-instance-name",
            "svc-a",
            "--advertised-ip",
            "10.0.0.5",
            "--tag",
            "web,db",
            "--tag",
            "edge",
            "--no-metadata",
        ])
        .unwrap();
        let config = cli.advertise_config();
        assert_eq!(config.advertised_ip, Some("10.0.0.5".parse().unwrap()));
        assert_eq!(config.tags, vec!["web", "db", "edge"]);
        assert!(cli.no_metadata);
    }

    #[test]
    fn test_external_ip_conflicts_with_no_metadata() {
        assert!(Cli::try_parse_from([
            "dynamic-port-server",
            "--service-instance-name",
            "svc-a",
            "--register-instance-external-ip",
            "--no-metadata",
        ])
        .is_err());
    }
}
