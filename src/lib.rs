//! Multi-tenant browser automation broker (SPEC_FULL.md §2 "System
//! overview"): transport → auth → session resolve/create → tool
//! dispatcher → (session+tab+driver | autonomous orchestrator).
//!
//! This file is the composition root (SPEC_FULL.md §9 "Global state →
//! explicit config"): every long-lived component is built once here and
//! threaded through by reference/`Arc`, rather than reached via a
//! process-wide singleton.

pub mod auth;
pub mod autonomous;
pub mod browser_profile;
pub mod browser_setup;
pub mod config;
pub mod crawl_events;
pub mod driver;
pub mod errors;
pub mod peer_sync;
pub mod session;
pub mod snapshot;
pub mod state_store;
pub mod tools;
pub mod transport;
pub mod utils;

use std::path::PathBuf;
use std::sync::Arc;

use config::Cli;

/// Parses `"W,H"` into a [`driver::Viewport`], ignoring a malformed value
/// rather than failing startup over a cosmetic flag.
fn parse_viewport(spec: &str) -> Option<driver::Viewport> {
    let (w, h) = spec.split_once(',')?;
    Some(driver::Viewport { width: w.trim().parse().ok()?, height: h.trim().parse().ok()? })
}

async fn load_initial_storage_state(path: &Option<PathBuf>) -> Option<driver::StorageState> {
    let path = path.as_ref()?;
    match tokio::fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(state) => Some(state),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to parse --storage-state, ignoring");
                None
            }
        },
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read --storage-state, ignoring");
            None
        }
    }
}

fn init_tracing(cli: &Cli) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log_level.clone()));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    match cli.log_format {
        config::LogFormat::Json => subscriber.json().init(),
        config::LogFormat::Pretty => subscriber.init(),
    }
}

/// Builds every long-lived component and returns the assembled app state
/// plus the address to bind. Split out from [`run`] so tests can stand up
/// the router without also binding a real socket.
pub async fn build(cli: Cli) -> anyhow::Result<(Arc<transport::AppState>, std::net::SocketAddr)> {
    let data_dir = cli.output_dir.clone();
    tokio::fs::create_dir_all(&data_dir).await?;

    let node_id = peer_sync::NodeId::load_or_create(&data_dir).await?;

    let default_context_options = driver::ContextOptions {
        user_data_dir: cli.user_data_dir.clone(),
        headless: cli.headless,
        proxy_server: cli.proxy_server.clone(),
        ignore_https_errors: cli.ignore_https_errors,
        viewport: cli.viewport_size.as_deref().and_then(parse_viewport),
        user_agent: cli.user_agent.clone(),
        no_sandbox: cli.no_sandbox,
        storage_state: load_initial_storage_state(&cli.storage_state).await,
    };

    let session_manager = Arc::new(session::SessionManager::new(
        cli.max_concurrent_sessions,
        cli.session_timeout_ms,
        default_context_options,
    ));
    session_manager.clone().start_idle_sweeper();

    let state_store = Arc::new(state_store::SessionStateStore::new(&data_dir));
    let peer_sync = Arc::new(peer_sync::PeerSyncService::new(node_id, state_store.clone()));
    let event_bus = Arc::new(crawl_events::CrawlEventBus::new(1024));

    let tool_ctx = Arc::new(tools::ToolContext::new(
        session_manager.clone(),
        state_store.clone(),
        peer_sync.clone(),
        data_dir.clone(),
        data_dir.join("reports"),
        Some(event_bus.clone()),
        None,
        cli.image_responses,
    ));

    let auth_config = auth::AuthConfig::from_cli(&cli);

    let oauth = if cli.entra_auth_enabled && cli.azure_tenant_id.is_some() {
        let server_base_url = cli.server_base_url.clone().unwrap_or_else(|| format!("http://{}", cli.socket_addr()));
        Some(auth::OAuthProxyState::new(
            server_base_url.clone(),
            cli.azure_tenant_id.as_deref().unwrap_or_default(),
            cli.azure_client_secret.clone(),
            vec![auth::StaticClient {
                client_id: cli.azure_client_id.clone().unwrap_or_else(|| "browser-broker".to_string()),
                redirect_uris: vec![format!("{server_base_url}/callback"), "http://127.0.0.1/callback".to_string()],
            }],
        ))
    } else {
        None
    };

    let state = Arc::new(transport::AppState::new(
        session_manager,
        tool_ctx,
        auth_config,
        oauth,
        peer_sync,
        event_bus,
        node_id,
        data_dir,
    ));

    Ok((state, cli.socket_addr()))
}

/// Runs the broker to completion: builds every component, binds with
/// port-contention recovery (SPEC_FULL.md §4.1), and serves until the
/// process is terminated.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    init_tracing(&cli);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting browser-broker");

    let (state, addr) = build(cli).await?;
    let router = transport::build_router(state);

    let listener = transport::port::bind_with_recovery(addr, true).await?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, router).await?;
    Ok(())
}
