//! taskrun-api: HTTP server exposing task CRUD and execution.

mod error;
mod routes;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use clap::Parser;
use taskrun::core::validator::CommandValidator;
use taskrun::io::config::{DEFAULT_CONFIG_PATH, load_config};
use taskrun::io::process::CommandRunner;
use taskrun::io::store::{JsonTaskStore, TaskStore};
use taskrun::service::TaskService;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::state::AppState;

#[derive(Parser)]
#[command(name = "taskrun-api")]
#[command(about = "HTTP API for registering and running tasks")]
struct Args {
    /// Address to bind the server to
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    /// Port to listen on
    #[arg(long, default_value = "8080")]
    port: u16,

    /// Path to config.toml
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Task store file (overrides `store_path` from config)
    #[arg(long)]
    store: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("taskrun_api=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let cfg = load_config(&args.config)?;
    let store_path = args.store.unwrap_or_else(|| cfg.store_path.clone());
    let shell = cfg.shell();
    info!(
        store = %store_path.display(),
        shell = shell.program(),
        shell_flag = shell.flag(),
        "starting taskrun-api"
    );

    let store: Arc<dyn TaskStore> = Arc::new(JsonTaskStore::new(store_path));
    let runner: Arc<dyn CommandRunner> = Arc::new(cfg.shell_runner());
    let service = TaskService::new(store, CommandValidator::new(cfg.command_policy()), runner);
    let state = AppState::new(service);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .nest("/api", routes::api_router())
        .layer(cors)
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", args.bind, args.port).parse()?;
    info!(addr = %addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
