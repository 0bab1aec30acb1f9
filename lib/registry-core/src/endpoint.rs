//! Endpoint management
use crate::{CoreError, Result};
use serde::{Deserialize, Serialize};

/// A named, addressable service instance registered with the directory
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub name: String,
    /// `host:port` reachable from the registry
    pub address: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Endpoint {
    pub fn new(name: impl Into<String>, address: impl Into<String>, tags: Vec<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            tags,
        }
    }

    /// Check the name is non-empty and the address looks like `host:port`
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CoreError::InvalidEndpoint("name must not be empty".to_string()));
        }
        validate_address(&self.address)
    }

    /// Split the address into host and port
    pub fn host_port(&self) -> Option<(&str, u16)> {
        split_host_port(&self.address)
    }

    /// Two registrations are equivalent when address and tags match exactly
    pub fn same_registration(&self, other: &Endpoint) -> bool {
        self.address == other.address && self.tags == other.tags
    }
}

fn validate_address(address: &str) -> Result<()> {
    split_host_port(address).map(|_| ()).ok_or_else(|| {
        CoreError::InvalidEndpoint(format!("address must be host:port, got {:?}", address))
    })
}

fn split_host_port(address: &str) -> Option<(&str, u16)> {
    let (host, port) = address.rsplit_once(':')?;
    let port = port.parse::<u16>().ok()?;

    // IPv6 literals must be bracketed: [::1]:8080
    let host = match host.strip_prefix('[') {
        Some(inner) => inner.strip_suffix(']')?,
        None if host.contains(':') => return None,
        None => host,
    };

    if host.is_empty() || host.chars().any(char::is_whitespace) {
        return None;
    }
    Some((host, port))
}
