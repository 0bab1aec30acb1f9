//! Service registry holding the endpoint directory

use crate::provisioner::{AccessProvisioner, NoopProvisioner};
use crate::{Endpoint, RegistryMetrics, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time;
use tracing::{debug, info, warn};

/// Default bound on a single grant or revoke call
pub const DEFAULT_PROVISION_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of adding an endpoint to the directory
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Registration {
    /// No entry existed under this name
    Created,
    /// An entry existed with a different address or tags
    Updated,
    /// An identical entry already existed, nothing was provisioned
    Unchanged,
}

impl Registration {
    pub fn as_str(&self) -> &'static str {
        match self {
            Registration::Created => "created",
            Registration::Updated => "updated",
            Registration::Unchanged => "unchanged",
        }
    }
}

/// ServiceRegistry maintains the directory of registered endpoints.
///
/// Every read and write takes the same exclusive lock, held only for the
/// in-memory operation. Provisioning hooks run after the lock is released.
pub struct ServiceRegistry {
    // Map of endpoint name to endpoint
    endpoints: Mutex<HashMap<String, Endpoint>>,
    provisioner: Arc<dyn AccessProvisioner>,
    provision_timeout: Duration,
    metrics: RegistryMetrics,
}

impl ServiceRegistry {
    /// Create a registry without access provisioning
    pub fn new() -> Result<Self> {
        Self::with_provisioner(Arc::new(NoopProvisioner), DEFAULT_PROVISION_TIMEOUT)
    }

    /// Create a registry that calls `provisioner` on every add and remove
    pub fn with_provisioner(
        provisioner: Arc<dyn AccessProvisioner>,
        provision_timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            endpoints: Mutex::new(HashMap::new()),
            provisioner,
            provision_timeout,
            metrics: RegistryMetrics::new()?,
        })
    }

    /// Metrics shared with the API surface and the health monitor
    pub fn metrics(&self) -> &RegistryMetrics {
        &self.metrics
    }

    /// Register or update an endpoint
    pub async fn add(&self, endpoint: Endpoint) -> Result<Registration> {
        if let Err(e) = endpoint.validate() {
            self.metrics.registrations_total.with_label_values(&["rejected"]).inc();
            return Err(e);
        }

        let outcome = {
            let mut endpoints = self.endpoints.lock().await;
            let outcome = match endpoints.get(&endpoint.name) {
                Some(existing) if existing.same_registration(&endpoint) => Registration::Unchanged,
                Some(_) => Registration::Updated,
                None => Registration::Created,
            };
            if outcome != Registration::Unchanged {
                endpoints.insert(endpoint.name.clone(), endpoint.clone());
            }
            self.metrics.endpoints.set(endpoints.len() as i64);
            outcome
        };

        self.metrics
            .registrations_total
            .with_label_values(&[outcome.as_str()])
            .inc();

        match outcome {
            Registration::Unchanged => {
                debug!("Endpoint {} re-registered unchanged at {}", endpoint.name, endpoint.address);
            }
            _ => {
                info!(
                    "Registered endpoint {} at {} ({}, tags: {:?})",
                    endpoint.name,
                    endpoint.address,
                    outcome.as_str(),
                    endpoint.tags
                );
                self.grant(&endpoint).await;
            }
        }

        Ok(outcome)
    }

    /// Deregister an endpoint by name
    pub async fn remove(&self, name: &str) -> Option<Endpoint> {
        let removed = {
            let mut endpoints = self.endpoints.lock().await;
            let removed = endpoints.remove(name);
            self.metrics.endpoints.set(endpoints.len() as i64);
            removed
        };

        if let Some(endpoint) = &removed {
            info!("Deregistered endpoint {} at {}", endpoint.name, endpoint.address);
            self.revoke(name).await;
        }
        removed
    }

    /// Remove `endpoint` only if the directory still holds exactly this registration.
    ///
    /// Returns false if the entry is gone or was re-registered with a different
    /// address or tags since it was observed.
    pub async fn evict(&self, endpoint: &Endpoint) -> bool {
        let evicted = {
            let mut endpoints = self.endpoints.lock().await;
            let matches = endpoints
                .get(&endpoint.name)
                .is_some_and(|current| current.same_registration(endpoint));
            if matches {
                endpoints.remove(&endpoint.name);
                self.metrics.endpoints.set(endpoints.len() as i64);
            }
            matches
        };

        if evicted {
            info!("Evicted endpoint {} at {}", endpoint.name, endpoint.address);
            self.metrics.evictions_total.inc();
            self.revoke(&endpoint.name).await;
        } else {
            debug!("Skipping eviction of {}: entry changed or already removed", endpoint.name);
        }
        evicted
    }

    /// Independent copy of the directory, ordered by name
    pub async fn snapshot(&self) -> BTreeMap<String, Endpoint> {
        let endpoints = self.endpoints.lock().await;
        endpoints
            .iter()
            .map(|(name, endpoint)| (name.clone(), endpoint.clone()))
            .collect()
    }

    /// Get a single endpoint
    pub async fn get(&self, name: &str) -> Option<Endpoint> {
        self.endpoints.lock().await.get(name).cloned()
    }

    /// Get count of registered endpoints
    pub async fn len(&self) -> usize {
        self.endpoints.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn grant(&self, endpoint: &Endpoint) {
        let provisioner = self.provisioner.name();
        match time::timeout(self.provision_timeout, self.provisioner.grant(endpoint)).await {
            Ok(Ok(())) => debug!("{} granted access for {}", provisioner, endpoint.name),
            Ok(Err(e)) => {
                self.metrics.provision_failures_total.with_label_values(&["grant"]).inc();
                warn!("{} failed to grant access for {}: {:#}", provisioner, endpoint.name, e);
            }
            Err(_) => {
                self.metrics.provision_failures_total.with_label_values(&["grant"]).inc();
                warn!(
                    "{} grant for {} timed out after {:?}",
                    provisioner, endpoint.name, self.provision_timeout
                );
            }
        }
    }

    async fn revoke(&self, name: &str) {
        let provisioner = self.provisioner.name();
        match time::timeout(self.provision_timeout, self.provisioner.revoke(name)).await {
            Ok(Ok(())) => debug!("{} revoked access for {}", provisioner, name),
            Ok(Err(e)) => {
                self.metrics.provision_failures_total.with_label_values(&["revoke"]).inc();
                warn!("{} failed to revoke access for {}: {:#}", provisioner, name, e);
            }
            Err(_) => {
                self.metrics.provision_failures_total.with_label_values(&["revoke"]).inc();
                warn!(
                    "{} revoke for {} timed out after {:?}",
                    provisioner, name, self.provision_timeout
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Provisioner that counts calls and can be told to fail or hang
    #[derive(Default)]
    pub struct RecordingProvisioner {
        pub grants: AtomicUsize,
        pub revokes: AtomicUsize,
        pub fail: AtomicBool,
        pub hang: AtomicBool,
    }

    #[async_trait::async_trait]
    impl AccessProvisioner for RecordingProvisioner {
        async fn grant(&self, _endpoint: &Endpoint) -> anyhow::Result<()> {
            self.grants.fetch_add(1, Ordering::SeqCst);
            if self.hang.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(anyhow!("firewall api unavailable"));
            }
            Ok(())
        }

        async fn revoke(&self, _name: &str) -> anyhow::Result<()> {
            self.revokes.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(anyhow!("firewall api unavailable"));
            }
            Ok(())
        }
    }

    fn registry_with(provisioner: Arc<RecordingProvisioner>) -> ServiceRegistry {
        ServiceRegistry::with_provisioner(provisioner, Duration::from_millis(200)).unwrap()
    }

    fn endpoint(name: &str, address: &str, tags: &[&str]) -> Endpoint {
        Endpoint::new(name, address, tags.iter().map(|t| t.to_string()).collect())
    }

    #[tokio::test]
    async fn test_last_registration_wins() {
        let registry = ServiceRegistry::new().unwrap();
        registry.add(endpoint("svc-a", "10.0.0.5:1000", &[])).await.unwrap();
        registry.add(endpoint("svc-b", "10.0.0.6:1000", &[])).await.unwrap();
        registry.add(endpoint("svc-a", "10.0.0.7:2000", &["web"])).await.unwrap();

        let snapshot = registry.snapshot().await;
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot["svc-a"], endpoint("svc-a", "10.0.0.7:2000", &["web"]));
        assert_eq!(snapshot["svc-b"].address, "10.0.0.6:1000");
    }

    #[tokio::test]
    async fn test_identical_registration_grants_once() {
        let provisioner = Arc::new(RecordingProvisioner::default());
        let registry = registry_with(provisioner.clone());
        let e = endpoint("svc-a", "10.0.0.5:34521", &["web"]);

        assert_eq!(registry.add(e.clone()).await.unwrap(), Registration::Created);
        assert_eq!(registry.add(e).await.unwrap(), Registration::Unchanged);
        assert_eq!(provisioner.grants.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_changed_registration_grants_again() {
        let provisioner = Arc::new(RecordingProvisioner::default());
        let registry = registry_with(provisioner.clone());

        registry.add(endpoint("svc-a", "10.0.0.5:1", &["web"])).await.unwrap();
        let outcome = registry.add(endpoint("svc-a", "10.0.0.5:1", &["web", "db"])).await.unwrap();

        assert_eq!(outcome, Registration::Updated);
        assert_eq!(provisioner.grants.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalid_endpoint_leaves_directory_untouched() {
        let provisioner = Arc::new(RecordingProvisioner::default());
        let registry = registry_with(provisioner.clone());

        assert!(registry.add(endpoint("", "10.0.0.5:1", &[])).await.is_err());
        assert!(registry.add(endpoint("svc-a", "not-an-address", &[])).await.is_err());
        assert!(registry.is_empty().await);
        assert_eq!(provisioner.grants.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_remove_revokes_only_existing() {
        let provisioner = Arc::new(RecordingProvisioner::default());
        let registry = registry_with(provisioner.clone());
        registry.add(endpoint("svc-a", "10.0.0.5:1", &[])).await.unwrap();

        assert!(registry.remove("missing").await.is_none());
        assert_eq!(provisioner.revokes.load(Ordering::SeqCst), 0);

        assert!(registry.remove("svc-a").await.is_some());
        assert!(registry.get("svc-a").await.is_none());
        assert_eq!(provisioner.revokes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_provision_failure_keeps_registration() {
        let provisioner = Arc::new(RecordingProvisioner::default());
        provisioner.fail.store(true, Ordering::SeqCst);
        let registry = registry_with(provisioner.clone());

        let outcome = registry.add(endpoint("svc-a", "10.0.0.5:1", &[])).await.unwrap();
        assert_eq!(outcome, Registration::Created);
        assert!(registry.get("svc-a").await.is_some());
        assert_eq!(
            registry
                .metrics()
                .provision_failures_total
                .with_label_values(&["grant"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn test_hung_provisioner_times_out() {
        let provisioner = Arc::new(RecordingProvisioner::default());
        provisioner.hang.store(true, Ordering::SeqCst);
        let registry = registry_with(provisioner.clone());

        let result = time::timeout(
            Duration::from_secs(5),
            registry.add(endpoint("svc-a", "10.0.0.5:1", &[])),
        )
        .await;
        assert!(result.is_ok(), "add should return once the grant times out");
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_hung_grant_does_not_hold_lock() {
        /// Grants for `svc-slow` never finish; everything else succeeds
        #[derive(Default)]
        struct StallingProvisioner {
            stalled: tokio::sync::Notify,
        }

        #[async_trait::async_trait]
        impl AccessProvisioner for StallingProvisioner {
            async fn grant(&self, endpoint: &Endpoint) -> anyhow::Result<()> {
                if endpoint.name == "svc-slow" {
                    self.stalled.notify_one();
                    std::future::pending::<()>().await;
                }
                Ok(())
            }

            async fn revoke(&self, _name: &str) -> anyhow::Result<()> {
                Ok(())
            }
        }

        let provisioner = Arc::new(StallingProvisioner::default());
        let registry = Arc::new(
            ServiceRegistry::with_provisioner(provisioner.clone(), Duration::from_secs(30)).unwrap(),
        );

        let slow = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.add(endpoint("svc-slow", "10.0.0.5:1", &[])).await })
        };
        time::timeout(Duration::from_secs(5), provisioner.stalled.notified())
            .await
            .expect("grant for svc-slow should start");

        let other = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.add(endpoint("svc-b", "10.0.0.6:1", &[])).await })
        };
        let outcome = time::timeout(Duration::from_secs(1), other)
            .await
            .expect("add blocked behind a pending grant")
            .unwrap()
            .unwrap();
        assert_eq!(outcome, Registration::Created);

        let snapshot = time::timeout(Duration::from_secs(1), registry.snapshot())
            .await
            .expect("snapshot blocked behind a pending grant");
        assert!(snapshot.contains_key("svc-slow"));
        assert!(snapshot.contains_key("svc-b"));
        assert!(!slow.is_finished());
        slow.abort();
    }

    #[tokio::test]
    async fn test_evict_skips_changed_entry() {
        let provisioner = Arc::new(RecordingProvisioner::default());
        let registry = registry_with(provisioner.clone());
        let old = endpoint("svc-a", "10.0.0.5:1", &[]);
        registry.add(old.clone()).await.unwrap();
        registry.add(endpoint("svc-a", "10.0.0.5:2", &[])).await.unwrap();

        assert!(!registry.evict(&old).await);
        assert_eq!(registry.get("svc-a").await.unwrap().address, "10.0.0.5:2");
        assert_eq!(provisioner.revokes.load(Ordering::SeqCst), 0);

        let current = registry.get("svc-a").await.unwrap();
        assert!(registry.evict(&current).await);
        assert!(registry.is_empty().await);
        assert_eq!(registry.metrics().evictions_total.get(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_is_independent() {
        let registry = ServiceRegistry::new().unwrap();
        registry.add(endpoint("svc-a", "10.0.0.5:1", &[])).await.unwrap();

        let snapshot = registry.snapshot().await;
        registry.remove("svc-a").await;
        registry.add(endpoint("svc-b", "10.0.0.6:1", &[])).await.unwrap();

        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains_key("svc-a"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_access_never_tears() {
        let registry = Arc::new(ServiceRegistry::new().unwrap());
        let mut tasks = Vec::new();

        for writer in 0..8u16 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                for round in 0..200u16 {
                    let name = format!("svc-{}", round % 10);
                    // Port always encodes the name, so a torn entry is detectable
                    let address = format!("10.0.{}.{}:{}", writer, round % 250, 1000 + round % 10);
                    registry.add(Endpoint::new(name.clone(), address, vec![])).await.unwrap();
                    if round % 7 == 0 {
                        registry.remove(&name).await;
                    }
                }
            }));
        }

        for _ in 0..4 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                for _ in 0..200 {
                    for (name, endpoint) in registry.snapshot().await {
                        assert_eq!(name, endpoint.name);
                        let (_, port) = endpoint.host_port().unwrap();
                        assert_eq!(format!("svc-{}", port - 1000), name);
                    }
                }
            }));
        }

        for task in tasks {
            task.await.unwrap();
        }
        assert!(registry.len().await <= 10);
        assert_eq!(registry.metrics().endpoints.get() as usize, registry.len().await);
    }
}
