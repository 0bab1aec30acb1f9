//! Periodic liveness monitoring and eviction

use crate::health_check::{HealthChecker, Probe};
use futures::future::join_all;
use registry_core::{Endpoint, ServiceRegistry};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time;
use tracing::{debug, info, warn};

/// Summary of one monitor cycle
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Endpoints probed this cycle
    pub checked: usize,
    /// Endpoints with at least one successful attempt
    pub healthy: usize,
    /// Names removed from the directory this cycle
    pub evicted: Vec<String>,
}

/// Background loop probing every registered endpoint and evicting dead ones.
///
/// Each cycle works from a snapshot of the directory, so registrations that
/// arrive mid-cycle are picked up on the next one.
pub struct HealthMonitor<P> {
    registry: Arc<ServiceRegistry>,
    checker: HealthChecker<P>,
    // Consecutive failed cycles per endpoint name, tied to the probed registration
    failures: HashMap<String, (Endpoint, u32)>,
}

impl<P: Probe> HealthMonitor<P> {
    /// Create a new health monitor
    pub fn new(registry: Arc<ServiceRegistry>, checker: HealthChecker<P>) -> Self {
        Self {
            registry,
            checker,
            failures: HashMap::new(),
        }
    }

    /// Run cycles forever, sleeping `check_interval` between them
    pub async fn run(mut self) {
        let interval = self.checker.config().check_interval;
        info!("Health monitor started with interval: {:?}", interval);

        loop {
            let report = self.run_cycle().await;
            if !report.evicted.is_empty() {
                info!(
                    "Health cycle evicted {} of {} endpoints: {:?}",
                    report.evicted.len(),
                    report.checked,
                    report.evicted
                );
            } else if report.checked > 0 {
                debug!("Health cycle checked {} endpoints, all healthy", report.checked);
            }

            time::sleep(interval).await;
        }
    }

    /// Probe every endpoint in the current snapshot once
    pub async fn run_cycle(&mut self) -> CycleReport {
        let snapshot = self.registry.snapshot().await;

        // Forget counters for endpoints that left or re-registered elsewhere
        self.failures.retain(|name, (probed, _)| {
            snapshot
                .get(name)
                .is_some_and(|current| current.same_registration(probed))
        });

        if snapshot.is_empty() {
            return CycleReport::default();
        }

        let checker = &self.checker;
        let results: Vec<(Endpoint, bool, u32)> =
            join_all(snapshot.into_values().map(|endpoint| async move {
                let (healthy, failed_attempts) = checker.check_endpoint(&endpoint).await;
                (endpoint, healthy, failed_attempts)
            }))
            .await;

        let threshold = self.checker.config().eviction_threshold.max(1);
        let metrics = self.registry.metrics();
        let mut report = CycleReport {
            checked: results.len(),
            ..CycleReport::default()
        };

        for (endpoint, healthy, failed_attempts) in results {
            metrics.probe_failures_total.inc_by(u64::from(failed_attempts));

            if healthy {
                report.healthy += 1;
                self.failures.remove(&endpoint.name);
                continue;
            }

            let (probed, failed_cycles) = self
                .failures
                .entry(endpoint.name.clone())
                .or_insert_with(|| (endpoint.clone(), 0));
            if !probed.same_registration(&endpoint) {
                *probed = endpoint.clone();
                *failed_cycles = 0;
            }
            *failed_cycles += 1;
            if *failed_cycles < threshold {
                warn!(
                    "Endpoint {} at {} unhealthy for {}/{} cycles",
                    endpoint.name, endpoint.address, failed_cycles, threshold
                );
                continue;
            }

            self.failures.remove(&endpoint.name);
            if self.registry.evict(&endpoint).await {
                report.evicted.push(endpoint.name);
            }
        }

        report
    }
}
