use anyhow::{anyhow, Context, Result};
use clap::Parser;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use registry_core::{AccessProvisioner, NoopProvisioner, ServiceRegistry, WebhookProvisioner};
use registry_health::{HealthChecker, HealthMonitor, HttpProbe};
use registry_http::RegistryApi;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;

use config::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    info!("Starting service registry...");

    if let Err(e) = run(cli).await {
        error!("Service registry failed: {:#}", e);
        return Err(e);
    }
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli) -> Result<()> {
    let provisioner: Arc<dyn AccessProvisioner> = match &cli.provisioner_url {
        Some(url) => {
            info!("Access provisioning via webhook at {}", url);
            Arc::new(WebhookProvisioner::new(url.clone(), cli.provision_timeout())?)
        }
        None => {
            info!("No access provisioner configured");
            Arc::new(NoopProvisioner)
        }
    };

    let registry = Arc::new(ServiceRegistry::with_provisioner(
        provisioner,
        cli.provision_timeout(),
    )?);
    info!("Service registry initialized");

    let health_check_config = cli.health_check_config();
    info!("  - Probe path: {}", health_check_config.http_path);
    info!("  - Interval: {:?}", health_check_config.check_interval);
    info!("  - Timeout: {:?}", health_check_config.timeout);
    info!("  - Attempts: {}", health_check_config.max_attempts);
    info!("  - Backoff: {:?}", health_check_config.retry_backoff);
    info!("  - Eviction threshold: {} cycles", health_check_config.eviction_threshold);

    let probe = HttpProbe::from_config(&health_check_config)?;
    let monitor = HealthMonitor::new(
        registry.clone(),
        HealthChecker::new(probe, health_check_config),
    );
    let monitor_task = tokio::spawn(monitor.run());

    let api = Arc::new(RegistryApi::new(registry));

    let listener = TcpListener::bind(&cli.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", cli.listen_addr))?;
    info!("HTTP server listening on {}", cli.listen_addr);

    tokio::select! {
        _ = accept_connections(listener, api) => {}
        e = monitor_stopped(monitor_task) => return Err(e),
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Shutdown signal received, exiting...");
        }
    }

    Ok(())
}

/// Wait for the monitor task to end; it only does so on panic or cancellation
async fn monitor_stopped(task: JoinHandle<()>) -> anyhow::Error {
    match task.await {
        Ok(()) => anyhow!("health monitor exited"),
        Err(e) => anyhow!("health monitor stopped: {}", e),
    }
}

/// Accept HTTP connections, one task per connection
async fn accept_connections(listener: TcpListener, api: Arc<RegistryApi>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer_addr)) => {
                let io = TokioIo::new(stream);
                let api = api.clone();

                tokio::task::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| {
                        let api = api.clone();
                        async move { api.handle(req).await }
                    });

                    if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                        debug!("Error serving HTTP connection from {}: {}", peer_addr, e);
                    }
                });
            }
            Err(e) => {
                warn!("Error accepting HTTP connection: {}", e);
            }
        }
    }
}
