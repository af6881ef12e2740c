use std::sync::Arc;

use agent_runtime_core::agent::Agent;
use agent_runtime_core::config::RuntimeConfig;
use agent_runtime_core::demo_agent::EchoAgent;
use agent_runtime_core::http;
use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = RuntimeConfig::parse();
    setup_logging(&config.log);

    let data_dir = config.resolved_data_dir();
    info!(data_dir = %data_dir.display(), port = config.port, "agent-runtime starting");

    let store = agent_runtime_core::store::file_store::FileStore::new(data_dir);
    let agent = Agent::builder(EchoAgent)
        .with_store(store)
        .build()
        .await
        .context("failed to build agent")?;
    let agent = Arc::new(agent);

    let router = http::build_router(agent.clone());
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(addr = %addr, "listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    agent.shutdown().await?;
    Ok(())
}

fn setup_logging(log_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(log_level.to_string())
        .compact()
        .init();
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
