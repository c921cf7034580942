//! ghsync - incremental GitHub activity archiver
//!
//! Pull your GitHub activity feeds into a local SQLite archive and keep
//! them fresh with incremental re-runs.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ghsync_core::api::{GithubClient, GraphqlClient};
use ghsync_core::sync::{self, CommitEnrichment, EventSync};
use ghsync_core::types::EventSource;
use ghsync_core::{Config, Database};

#[derive(Parser, Debug)]
#[command(name = "ghsync")]
#[command(about = "Archive your GitHub activity into a local SQLite database")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sync events you authored, then backfill commit statistics
    SyncCreatedEvents,
    /// Sync events received from the people you follow
    SyncReceivedEvents,
    /// Record a snapshot of your profile counters
    SyncUserStats,
    /// Record a snapshot of your Actions billing usage
    SyncBillingStats,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration and database
    let config = Config::load().context("failed to load configuration")?;
    let _log_guard = ghsync_core::logging::init(&config.logging).ok();

    let db_path = Config::database_path();
    let db = Database::open(&db_path).context("failed to open database")?;
    db.migrate().context("failed to run migrations")?;

    match args.command {
        Command::SyncCreatedEvents => {
            let client = GithubClient::new(&config.github, config.sync.timeout_secs)
                .context("failed to create API client")?;
            let outcome = EventSync::new(&db, &client, config.sync.page_size)
                .sync(EventSource::Created)
                .context("failed to sync created events")?;
            println!(
                "Synced {} created events across {} pages ({:?} mode)",
                outcome.events_upserted, outcome.pages_fetched, outcome.mode
            );

            // Created events feed the enrichment pass directly
            let graphql = GraphqlClient::new(&config.github, config.sync.timeout_secs)
                .context("failed to create GraphQL client")?;
            let enriched = CommitEnrichment::new(&db, &graphql, config.sync.enrich_batch_size)
                .run()
                .context("failed to enrich commits")?;
            println!(
                "Enriched {} pushes ({} commits unresolved, {} pull requests linked)",
                enriched.events_updated, enriched.commits_unresolved, enriched.pull_requests_linked
            );
        }
        Command::SyncReceivedEvents => {
            let client = GithubClient::new(&config.github, config.sync.timeout_secs)
                .context("failed to create API client")?;
            let outcome = EventSync::new(&db, &client, config.sync.page_size)
                .sync(EventSource::Received)
                .context("failed to sync received events")?;
            println!(
                "Synced {} received events across {} pages ({:?} mode)",
                outcome.events_upserted, outcome.pages_fetched, outcome.mode
            );
        }
        Command::SyncUserStats => {
            let graphql = GraphqlClient::new(&config.github, config.sync.timeout_secs)
                .context("failed to create GraphQL client")?;
            sync::sync_user_stats(&db, &graphql).context("failed to sync user stats")?;
            println!("Recorded user stats snapshot");
        }
        Command::SyncBillingStats => {
            let client = GithubClient::new(&config.github, config.sync.timeout_secs)
                .context("failed to create API client")?;
            sync::sync_billing_stats(&db, &client).context("failed to sync billing stats")?;
            println!("Recorded billing stats snapshot");
        }
    }

    Ok(())
}
