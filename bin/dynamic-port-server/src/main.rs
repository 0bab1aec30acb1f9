use anyhow::{Context, Result};
use clap::Parser;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use registry_agent::{resolve_advertisement, MetadataClient, MetadataSource, RegistryClient};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod server;

use config::Cli;
use server::{handle_request, InstanceInfo};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    info!("Starting dynamic port server...");

    if let Err(e) = run(cli).await {
        error!("Dynamic port server failed: {:#}", e);
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
    let listener = TcpListener::bind(SocketAddr::new(cli.listen_ip, 0))
        .await
        .context("failed to bind ephemeral port")?;
    let local_addr = listener.local_addr()?;
    info!("Listening on {}", local_addr);

    let metadata = if cli.no_metadata {
        None
    } else {
        Some(MetadataClient::new(cli.metadata_host.clone(), cli.request_timeout())?)
    };

    let endpoint = resolve_advertisement(
        &cli.advertise_config(),
        local_addr.port(),
        metadata.as_ref().map(|m| m as &dyn MetadataSource),
    )
    .await
    .context("failed to resolve advertised address")?;

    info!("Registering endpoint [{}]", endpoint.address);
    let client = RegistryClient::new(&cli.service_registry, cli.request_timeout())?;
    client
        .register(&endpoint)
        .await
        .with_context(|| format!("failed to register with {}", cli.service_registry))?;

    let instance = Arc::new(InstanceInfo {
        name: endpoint.name,
        advertised_addr: endpoint.address,
    });

    loop {
        match listener.accept().await {
            Ok((stream, peer_addr)) => {
                let io = TokioIo::new(stream);
                let instance = instance.clone();

                tokio::task::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| {
                        let instance = instance.clone();
                        async move { handle_request(req, &instance).await }
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
