use std::sync::Arc;

use axum::Router;
use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use tokio::signal;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::store::{Document, FileStore};

mod config;
mod error;
mod process;
mod routes;
mod store;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    env_logger::builder()
        .filter_level(LevelFilter::Info)
        .filter(Some("tower_http"), LevelFilter::Debug)
        .filter(Some("json_depot_server"), LevelFilter::Debug)
        .parse_default_env()
        .init();

    let CliArgs { config, command } = CliArgs::parse();

    match command.unwrap_or(CliCommand::Serve) {
        CliCommand::Serve => serve(config).await,
        CliCommand::Split { source, count } => split(&config, source, count).await,
    }
}

#[derive(Parser)]
#[command(version, about = "Serves json documents and runs shell commands over http.")]
struct CliArgs {
    #[command(flatten)]
    config: Config,
    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Serve the http api. This is the default.
    Serve,
    /// Split a document into numbered split documents, then exit.
    Split {
        /// The document to split.
        #[arg(value_enum, default_value_t = SplitSource::Primary)]
        source: SplitSource,
        /// Number of split documents to create.
        #[arg(
            short = 'n',
            long,
            default_value_t = 10,
            value_parser = clap::value_parser!(u8).range(1..=20),
        )]
        count: u8,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SplitSource {
    Primary,
    Secondary,
}

async fn serve(config: Config) -> std::io::Result<()> {
    log::info!(
        version = env!("CARGO_PKG_VERSION"),
        api_version = json_depot_api::api::VERSION;
        "Initializing server"
    );

    let state = Arc::new(routes::AppState::new(&config));
    if !state.store.dir().is_dir() {
        log::warn!(path:debug = state.store.dir(); "data directory does not exist");
    }
    log::warn!(
        "POST /api/command runs arbitrary shell commands, only expose this server to trusted hosts"
    );

    log::info!(path = "/api"; "nesting sub-routes");
    let router = Router::new()
        .nest("/api", routes::routes(state))
        .fallback(routes::not_found)
        .layer(CatchPanicLayer::custom(error::panic_response))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let Config { host, port, .. } = config;
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!(
        addr:display = host,
        port = port.get();
        "listening to TCP"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn split(config: &Config, source: SplitSource, count: u8) -> std::io::Result<()> {
    let store = FileStore::from_config(config);
    let document = match source {
        SplitSource::Primary => Document::Primary,
        SplitSource::Secondary => Document::Secondary,
    };
    let summaries = store
        .split(document, usize::from(count))
        .await
        .map_err(std::io::Error::other)?;
    log::info!(
        source:display = store.file_name(document),
        splits = summaries.len();
        "splitting complete"
    );
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT (ctrl+c) handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => log::info!("received SIGINT (ctrl+c), shutting down"),
        () = terminate => log::info!("received SIGTERM, shutting down"),
    }
}
