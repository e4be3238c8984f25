use std::{error::Error, fs::OpenOptions, net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    Router,
    extract::{MatchedPath, Request},
};
use axum_server::Handle;
use clap::Parser;
use rusqlite::Connection;
use tower_http::trace::TraceLayer;

use tracing_subscriber::{Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

use piggy_bank::{
    AppState, PlaidClient, PlaidEnvironment, SyncConfig, build_router, graceful_shutdown,
    poll_connections_task,
};

/// The REST API server for piggy_bank.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long)]
    db_path: String,

    /// The port to serve the API from.
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// The Plaid client ID.
    #[arg(long, env = "PLAID_CLIENT_ID", hide_env_values = true)]
    plaid_client_id: String,

    /// The Plaid secret for `plaid_env`.
    #[arg(long, env = "PLAID_SECRET", hide_env_values = true)]
    plaid_secret: String,

    /// The Plaid environment to connect to.
    #[arg(long, env = "PLAID_ENV", value_enum, default_value_t = PlaidEnvironment::Sandbox)]
    plaid_env: PlaidEnvironment,

    /// The number of transactions to request per page (1-500).
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u32).range(1..=500))]
    page_size: u32,

    /// Seconds to wait for a single page from Plaid.
    #[arg(long, default_value_t = 30)]
    request_timeout_secs: u64,

    /// How many times to retry a page after a transient failure.
    #[arg(long, default_value_t = 3)]
    max_retries: u32,

    /// Seconds between syncs of every connection, 0 to disable polling.
    #[arg(long, default_value_t = 6 * 60 * 60)]
    poll_interval_secs: u64,
}

impl Args {
    fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            page_size: self.page_size,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            max_retries: self.max_retries,
            poll_interval: match self.poll_interval_secs {
                0 => None,
                seconds => Some(Duration::from_secs(seconds)),
            },
            ..SyncConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    setup_logging()?;

    let args = Args::parse();

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));

    let conn = Connection::open(&args.db_path)?;
    let plaid_client = PlaidClient::new(args.plaid_env, &args.plaid_client_id, &args.plaid_secret);
    let sync_config = args.sync_config();
    let poll_interval = sync_config.poll_interval;
    let app_state = AppState::new(conn, plaid_client, sync_config)?;

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    match poll_interval {
        Some(interval) => {
            tokio::spawn(poll_connections_task(app_state.clone(), interval));
        }
        None => tracing::info!("Polling is disabled, connections sync on webhooks only."),
    }

    let router = add_tracing_layer(build_router(app_state));

    tracing::info!("HTTP server listening on {}", addr);
    axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await?;

    Ok(())
}

fn setup_logging() -> Result<(), std::io::Error> {
    let stdout_log = tracing_subscriber::fmt::layer().pretty();

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open("debug.log")?;

    let debug_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_writer(Arc::new(log_file));

    tracing_subscriber::registry()
        .with(
            stdout_log
                .with_filter(filter::LevelFilter::INFO)
                .and_then(debug_log)
                .with_filter(filter::LevelFilter::DEBUG),
        )
        .init();

    Ok(())
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // Errors are logged by `Error::into_response`.
        .on_failure(());

    router.layer(tracing_layer)
}
