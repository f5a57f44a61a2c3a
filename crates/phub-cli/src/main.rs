use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use phub_core::PlatformId;
use phub_storage::PgQuestionStore;
use phub_sync::{maybe_build_scheduler, IngestConfig, IngestService, JobReport};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "phub-cli")]
#[command(about = "Practice Hub question ingestion")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scrape every enabled platform once.
    Sweep {
        #[arg(long)]
        force: bool,
    },
    /// Scrape a single platform now, bypassing the queue.
    Scrape {
        platform: String,
        #[arg(long)]
        force: bool,
    },
    /// Queue one job and wait for its report.
    Enqueue {
        #[arg(required = true)]
        platforms: Vec<String>,
        #[arg(long)]
        force: bool,
    },
    /// Run the cron sweep until Ctrl-C.
    Schedule,
    /// Apply database migrations.
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,phub=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let cli = Cli::parse();
    let config = IngestConfig::from_env();

    if let Some(Commands::Migrate) = cli.command {
        return migrate(&config).await;
    }

    let service = Arc::new(IngestService::from_config(&config).await?);
    let outcome = run(&cli, &config, service.clone()).await;
    service.shutdown().await;
    outcome
}

async fn run(cli: &Cli, config: &IngestConfig, service: Arc<IngestService>) -> Result<()> {
    match cli.command.as_ref().unwrap_or(&Commands::Sweep { force: false }) {
        Commands::Sweep { force } => {
            let summary = service.run_sweep(*force).await;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Scrape { platform, force } => {
            let platform = PlatformId::new(platform);
            let ingested = service.scrape_platform(&platform, *force).await?;
            println!("scrape complete: platform={platform} ingested={ingested}");
        }
        Commands::Enqueue { platforms, force } => {
            let report = enqueue_and_wait(&service, platforms, *force).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Schedule => {
            let Some(mut sched) = maybe_build_scheduler(service.clone(), config).await? else {
                bail!("scheduler disabled; set PHUB_SCHEDULER_ENABLED=true");
            };
            sched.start().await.context("starting scheduler")?;
            info!(cron = %config.sweep_cron, "scheduler running; Ctrl-C to stop");
            tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
            sched.shutdown().await.context("stopping scheduler")?;
        }
        Commands::Migrate => migrate(config).await?,
    }
    Ok(())
}

async fn enqueue_and_wait(
    service: &IngestService,
    platforms: &[String],
    force: bool,
) -> Result<JobReport> {
    let mut reports = service.subscribe();
    let job_id = service.enqueue_scrape_job(platforms.iter().map(PlatformId::new).collect(), force);
    loop {
        let report = reports.recv().await.context("scrape worker stopped")?;
        if report.job_id == job_id {
            return Ok(report);
        }
    }
}

async fn migrate(config: &IngestConfig) -> Result<()> {
    let Some(url) = config.database_url.as_deref() else {
        bail!("DATABASE_URL must be set to run migrations");
    };
    let store = PgQuestionStore::connect(url)
        .await
        .context("connecting to postgres")?;
    store.migrate().await.context("running migrations")?;
    println!("migrations applied");
    Ok(())
}
