//! `mint-gateway`: serves the REST facade until Ctrl-C.

use std::sync::Arc;

use clap::Parser;
use mint_server::network::NetworkModule;
use mint_server::telemetry::{init_tracing, install_metrics};
use mint_server::{GatewayConfig, HttpChannelFactory};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GatewayConfig::parse();
    init_tracing(config.log_format)?;
    install_metrics(config.metrics_port)?;

    let services = config.services(config.certificate_store(), Arc::new(HttpChannelFactory))?;
    let mut network = NetworkModule::new(config.network(), services);
    let port = network.start().await?;
    info!(
        port,
        soap_server = %config.soap_server,
        cert_subject = %config.cert_subject,
        "mint gateway started"
    );

    network.serve(shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for Ctrl-C; shutting down");
        return;
    }
    info!("shutdown signal received");
}
