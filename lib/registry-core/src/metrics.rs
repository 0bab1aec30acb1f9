//! Prometheus metrics for the registry

use crate::Result;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Prometheus metrics collector owned by a single registry instance
#[derive(Clone)]
pub struct RegistryMetrics {
    /// Number of endpoints currently in the directory
    pub endpoints: IntGauge,
    /// Registrations by outcome (created, updated, unchanged, rejected)
    pub registrations_total: IntCounterVec,
    /// Endpoints removed after failed liveness probes
    pub evictions_total: IntCounter,
    /// Individual failed probe attempts
    pub probe_failures_total: IntCounter,
    /// Provisioning hook failures by hook (grant, revoke)
    pub provision_failures_total: IntCounterVec,
    /// HTTP requests served by the API surface
    pub http_requests_total: IntCounterVec,
    registry: Arc<Registry>,
}

impl RegistryMetrics {
    /// Create a new metrics collector with its own prometheus registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());

        let endpoints = IntGauge::new("registry_endpoints", "Endpoints currently registered")?;
        let registrations_total = IntCounterVec::new(
            Opts::new("registry_registrations_total", "Registration requests by outcome"),
            &["outcome"],
        )?;
        let evictions_total = IntCounter::new(
            "registry_evictions_total",
            "Endpoints evicted after failed liveness probes",
        )?;
        let probe_failures_total = IntCounter::new(
            "registry_probe_failures_total",
            "Failed liveness probe attempts",
        )?;
        let provision_failures_total = IntCounterVec::new(
            Opts::new(
                "registry_provision_failures_total",
                "Failed access provisioning calls",
            ),
            &["hook"],
        )?;
        let http_requests_total = IntCounterVec::new(
            Opts::new("registry_http_requests_total", "HTTP requests served"),
            &["method", "path"],
        )?;

        registry.register(Box::new(endpoints.clone()))?;
        registry.register(Box::new(registrations_total.clone()))?;
        registry.register(Box::new(evictions_total.clone()))?;
        registry.register(Box::new(probe_failures_total.clone()))?;
        registry.register(Box::new(provision_failures_total.clone()))?;
        registry.register(Box::new(http_requests_total.clone()))?;

        Ok(Self {
            endpoints,
            registrations_total,
            evictions_total,
            probe_failures_total,
            provision_failures_total,
            http_requests_total,
            registry,
        })
    }

    /// Encode all metrics in the prometheus text format
    pub fn gather(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
