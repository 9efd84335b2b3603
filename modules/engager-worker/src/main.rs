use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::time::MissedTickBehavior;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use engager_common::{Config, Credential};
use engager_worker::api::Bounded;
use engager_worker::codec::CredentialCodec;
use engager_worker::lock::PgRunLock;
use engager_worker::store::{AccountStore, PgStore, RequestStore};
use engager_worker::worker::{EngagementWorker, WorkerDeps};
use x_client::{XClient, XClientConfig};

const LOCK_NAME: &str = "engagement-pass";

#[derive(Parser)]
#[command(name = "engager", about = "Dispatch like+repost engagements across registered accounts")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process pending requests on a fixed interval until interrupted
    Run,
    /// Process pending requests once and exit
    Once,
    /// Queue a post URL for engagement
    Enqueue {
        /// Post URL, e.g. https://x.com/someone/status/12345
        url: String,
    },
    /// Register an account (or replace its credential)
    AddAccount {
        #[arg(long)]
        external_id: String,
        #[arg(long, env = "ENGAGER_ACCESS_TOKEN")]
        access_token: String,
        #[arg(long, env = "ENGAGER_REFRESH_TOKEN")]
        refresh_token: String,
        #[arg(long, default_value_t = 7200)]
        expires_in: u64,
        #[arg(long, default_value = "")]
        scope: String,
    },
    /// List requests, newest first
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("engager=info".parse()?))
        .init();

    let cli = Cli::parse();

    let config = match cli.command {
        Command::Enqueue { .. } | Command::List => Config::store_from_env()?,
        _ => Config::worker_from_env()?,
    };
    config.log_redacted();

    let store = PgStore::connect(&config.database_url).await?;
    store.migrate().await?;

    match cli.command {
        Command::Run => run_interval(&config, store).await?,
        Command::Once => {
            let worker = build_worker(&config, store)?;
            let report = worker.process_pending().await?;
            println!("{:?}: {}", report.outcome, report.stats);
        }
        Command::Enqueue { url } => {
            if engager_worker::post_id::extract_post_id(&url).is_none() {
                anyhow::bail!("no post id found in {url}");
            }
            let request = store.create_request(&url).await?;
            println!("{}", request.id);
        }
        Command::AddAccount {
            external_id,
            access_token,
            refresh_token,
            expires_in,
            scope,
        } => {
            let codec = CredentialCodec::new(&config.token_secret);
            let encrypted = codec.encrypt(&Credential {
                access_token,
                refresh_token,
                expires_in_seconds: expires_in,
                scope,
            })?;
            let id = store.upsert_account(&external_id, &encrypted).await?;
            println!("{id}");
        }
        Command::List => {
            for request in store.list_requests().await? {
                println!(
                    "{}  {}  engaged={}  {}",
                    request.id,
                    request.created_at.format("%Y-%m-%dT%H:%M:%S"),
                    request.engaged_account_ids.len(),
                    request.target_url,
                );
            }
        }
    }

    Ok(())
}

fn build_worker(config: &Config, store: PgStore) -> Result<EngagementWorker> {
    let client = XClient::new(XClientConfig {
        base_url: config.x_api_base_url.clone(),
        timeout: config.x_request_timeout,
    })?;
    let store = Arc::new(store);
    let lock = PgRunLock::new(store.pool().clone(), LOCK_NAME, config.lock_stale_after);

    let worker = EngagementWorker::new(WorkerDeps {
        api: Arc::new(Bounded::new(client, config.call_timeout)),
        accounts: store.clone(),
        requests: store,
        codec: CredentialCodec::new(&config.token_secret),
        identity: config.client_identity.clone(),
        lock: Arc::new(lock),
    })
    .with_max_concurrency(config.max_concurrency);

    Ok(worker)
}

/// Tick `process_pending` every `config.interval` until Ctrl-C.
/// A pass that overruns the interval delays the next tick instead of stacking.
async fn run_interval(config: &Config, store: PgStore) -> Result<()> {
    let worker = build_worker(config, store)?;

    if config.client_identity.is_none() {
        info!("No X_CLIENT_ID/X_CLIENT_SECRET set, expired credentials will not be refreshed");
    }

    let mut ticker = tokio::time::interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        interval_secs = config.interval.as_secs(),
        "Engagement worker started"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match worker.process_pending().await {
                    Ok(report) => info!(outcome = ?report.outcome, "Engagement tick finished"),
                    Err(e) => error!(error = %e, "Engagement tick failed"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested, stopping engagement worker");
                break;
            }
        }
    }

    Ok(())
}
