//! Liveness checking for registered endpoints
pub mod health_check;
pub mod monitor;

pub use health_check::{HealthCheckConfig, HealthChecker, HttpProbe, Probe, ProbeError};
pub use monitor::{CycleReport, HealthMonitor};
