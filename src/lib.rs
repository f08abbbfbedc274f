pub mod api; // HTTP gateway: /api/interactive, /api/diagnose, /api/health
pub mod config;
pub mod conversation; // Ledger, phase machine, orchestrator
pub mod diagnosis; // Condition mapping + ranking filter
pub mod reasoning; // LLM client, JSON recovery, gateway

use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::api::ApiContext;
use crate::reasoning::{ChatCompletionClient, ReasoningGateway};

/// Entry point of the `triage-gateway` binary.
///
/// Serves the reasoning gateway over HTTP until Ctrl-C.
pub fn run() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let cfg = config::GatewayConfig::from_env();
    tracing::info!(
        base_url = %cfg.llm_base_url,
        model = %cfg.llm_model,
        bind = %cfg.bind_addr,
        "Gateway configuration loaded"
    );

    // The blocking client owns its own runtime: build it (and drop it) outside tokio.
    let client = match ChatCompletionClient::new(
        &cfg.llm_base_url,
        &cfg.llm_model,
        cfg.llm_api_key.clone(),
        cfg.timeout_secs,
    ) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(error = %e, "Cannot build reasoning client");
            return;
        }
    };
    let gateway = Arc::new(
        ReasoningGateway::new(Box::new(client)).with_retry_backoff(cfg.retry_backoff),
    );

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "Cannot start async runtime");
            return;
        }
    };

    let ctx = ApiContext::new(gateway.clone(), &cfg.llm_model);
    runtime.block_on(async move {
        let mut server = match api::start_gateway_server_on(ctx, cfg.bind_addr).await {
            Ok(server) => server,
            Err(e) => {
                tracing::error!(error = %e, "Gateway server failed to start");
                return;
            }
        };
        tracing::info!(addr = %server.session.server_addr, "Gateway listening");

        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Cannot listen for shutdown signal");
        }
        server.shutdown();
    });

    drop(runtime);
    drop(gateway);
    tracing::info!("{} stopped", config::APP_NAME);
}
