//! tubesub
//!
//! WebSub subscriber that mirrors YouTube channel uploads into `SQLite`.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use tubesub_core::WebSubConfig;
use tubesub_core::config::{DEFAULT_CALLBACK_PATH, DEFAULT_HUB_URL, DEFAULT_LEASE_SECONDS};
use tubesub_core::tracing_init::init_tracing;

use tubesub_server::hub::{HubClient, ReqwestHub};
use tubesub_server::renewal::{
    DEFAULT_RENEWAL_LIMIT, RenewalOptions, Renewer, spawn_renewal_task,
};
use tubesub_server::server::{AppState, build_router};
use tubesub_server::storage::Database;
use tubesub_server::subscriber::Subscriber;

const DAY_SECS: i64 = 24 * 60 * 60;

#[derive(Parser, Debug)]
#[command(name = "tubesub")]
#[command(version, about = "WebSub subscriber mirroring YouTube channel uploads")]
struct Args {
    /// Path to SQLite database file.
    #[arg(long, env = "TUBESUB_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long, env = "TUBESUB_LOG_JSON")]
    log_json: bool,

    #[command(flatten)]
    websub: WebSubArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct WebSubArgs {
    /// Public origin the hub reaches this server at (e.g. https://mirror.example).
    #[arg(long, env = "PUBLIC_ORIGIN")]
    public_origin: String,

    /// Path the callback endpoint is mounted at.
    #[arg(long, env = "WEBSUB_CALLBACK_PATH", default_value = DEFAULT_CALLBACK_PATH)]
    callback_path: String,

    /// Hub subscribe endpoint.
    #[arg(long, env = "WEBSUB_HUB_URL", default_value = DEFAULT_HUB_URL)]
    hub_url: String,

    /// Shared hub.verify_token.
    #[arg(long, env = "WEBSUB_VERIFY_TOKEN", hide_env_values = true)]
    verify_token: Option<String>,

    /// Shared hub.secret for notification signatures.
    #[arg(long, env = "WEBSUB_SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// Requested lease in seconds (0 lets the hub decide).
    #[arg(long, env = "WEBSUB_LEASE_SECONDS", default_value_t = DEFAULT_LEASE_SECONDS)]
    lease_seconds: u64,
}

impl WebSubArgs {
    fn into_config(self) -> WebSubConfig {
        WebSubConfig::new(&self.public_origin, &self.callback_path)
            .with_hub_url(self.hub_url)
            .with_verify_token(self.verify_token)
            .with_secret(self.secret)
            .with_lease_seconds(self.lease_seconds)
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the callback server and the background lease renewal.
    Serve {
        /// Address to listen on.
        #[arg(long, default_value = "0.0.0.0:8080", env = "LISTEN_ADDR")]
        addr: SocketAddr,

        /// Seconds between renewal sweeps (0 disables).
        #[arg(long, env = "TUBESUB_RENEW_INTERVAL_SECS", default_value_t = 3600)]
        renew_interval_secs: u64,
    },
    /// Register a channel and subscribe to its feed.
    Subscribe {
        /// External channel id (e.g. UCxxxx).
        #[arg(long)]
        channel_id: String,

        /// Channel title to store.
        #[arg(long)]
        title: Option<String>,

        /// Send the request even if the current lease is still fresh.
        #[arg(long)]
        force: bool,
    },
    /// Run one lease renewal sweep.
    Renew {
        /// Renew every scanned subscription.
        #[arg(long)]
        force: bool,

        /// Most subscriptions scanned.
        #[arg(long, default_value_t = DEFAULT_RENEWAL_LIMIT)]
        limit: i64,

        /// Renew leases with fewer than this many days left.
        #[arg(long, default_value_t = 2)]
        min_remaining_days: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing("tubesub_server=info", args.log_json)?;

    let config = Arc::new(args.websub.into_config());
    config.validate()?;

    let db = open_database(args.db_path.as_deref()).await?;
    let hub: Arc<dyn HubClient> = Arc::new(ReqwestHub::new(&config.hub_url)?);
    let subscriber = Subscriber::new(db.clone(), hub, Arc::clone(&config));

    match args.command {
        Command::Serve {
            addr,
            renew_interval_secs,
        } => serve(db, config, subscriber, addr, renew_interval_secs).await,
        Command::Subscribe {
            channel_id,
            title,
            force,
        } => {
            let owner = db.upsert_channel(&channel_id, title.as_deref()).await?;
            let outcome = subscriber
                .subscribe_channel(Some(owner), &channel_id, force)
                .await?;
            print_json(&outcome)
        }
        Command::Renew {
            force,
            limit,
            min_remaining_days,
        } => {
            let opts = RenewalOptions::new(min_remaining_days.saturating_mul(DAY_SECS), limit, force);
            let report = Renewer::new(db, subscriber).sweep(opts).await?;
            print_json(&report)
        }
    }
}

async fn serve(
    db: Database,
    config: Arc<WebSubConfig>,
    subscriber: Subscriber,
    addr: SocketAddr,
    renew_interval_secs: u64,
) -> anyhow::Result<()> {
    let normalized = db.normalize_topics().await?;
    if normalized > 0 {
        info!(normalized, "Rewrote legacy topic spellings");
    }

    let shutdown = CancellationToken::new();
    let renewal = (renew_interval_secs > 0).then(|| {
        spawn_renewal_task(
            Renewer::new(db.clone(), subscriber),
            Duration::from_secs(renew_interval_secs),
            RenewalOptions::default(),
            shutdown.clone(),
        )
    });

    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %addr,
        callback = %config.callback_url,
        "Starting tubesub"
    );

    let app = build_router(AppState { db, config });
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Received shutdown signal");
            signal.cancel();
        })
        .await?;

    shutdown.cancel();
    if let Some(handle) = renewal {
        handle.await?;
    }

    info!("tubesub stopped");
    Ok(())
}

async fn open_database(path: Option<&Path>) -> anyhow::Result<Database> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => default_db_path()?,
    };
    info!(path = %path.display(), "Opening database");
    Ok(Database::open(&path).await?)
}

fn default_db_path() -> anyhow::Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(home.join(".tubesub").join("tubesub.db"))
}

#[allow(clippy::print_stdout)]
fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
