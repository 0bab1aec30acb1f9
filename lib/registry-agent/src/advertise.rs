//! Resolution of the address and tags a registrant advertises

use crate::{AgentError, MetadataSource, Result};
use registry_core::Endpoint;
use std::net::{IpAddr, SocketAddr};
use tracing::info;

/// Registrant-side settings for building its endpoint
#[derive(Clone, Debug, Default)]
pub struct AdvertiseConfig {
    /// Unique service instance name
    pub name: String,
    /// Explicit IP to advertise
    pub advertised_ip: Option<IpAddr>,
    /// Advertise the instance's external IP from metadata
    pub use_external_ip: bool,
    /// Explicit tags; when empty, tags come from metadata
    pub tags: Vec<String>,
}

/// Build the endpoint a registrant listening on `port` should register.
///
/// The IP is the metadata external IP when requested, else the configured
/// IP, else the metadata internal IP. Without a metadata source only the
/// configured IP and tags are used.
pub async fn resolve_advertisement(
    config: &AdvertiseConfig,
    port: u16,
    metadata: Option<&dyn MetadataSource>,
) -> Result<Endpoint> {
    if config.name.trim().is_empty() {
        return Err(AgentError::InvalidConfiguration(
            "service instance name must not be empty".to_string(),
        ));
    }

    let ip = match (metadata, config.use_external_ip, config.advertised_ip) {
        (Some(metadata), true, _) => metadata.external_ip().await?,
        (None, true, _) => {
            return Err(AgentError::InvalidConfiguration(
                "external IP registration requires the metadata server".to_string(),
            ))
        }
        (_, false, Some(ip)) => ip,
        (Some(metadata), false, None) => metadata.internal_ip().await?,
        (None, false, None) => {
            return Err(AgentError::InvalidConfiguration(
                "an advertised IP is required when metadata lookups are disabled".to_string(),
            ))
        }
    };

    let tags = match metadata {
        Some(metadata) if config.tags.is_empty() => metadata.tags().await?,
        _ => config.tags.clone(),
    };

    let address = SocketAddr::new(ip, port).to_string();
    info!("Advertising {} as {} (tags: {:?})", config.name, address, tags);
    Ok(Endpoint::new(config.name.clone(), address, tags))
}
