use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use vidrec_core::{init_logging, load_dotenv, DatabasePool, EngineConfig, PgStore};
use vidrec_discovery::{EmbeddingClient, SemanticSearchService};
use vidrec_recommend::{build_cache_store, EngineStores, RecommendationEngine};
use vidrec_worker::{scheduler, JobKind, Jobs};

#[derive(Parser)]
#[command(name = "vidrec-worker")]
#[command(about = "Rebuild jobs for the video recommendation engine", long_about = None)]
#[command(version)]
struct Cli {
    /// Run one job and exit instead of starting the scheduler
    #[arg(long, value_enum)]
    job: Option<JobKind>,

    /// Apply the schema before doing anything else
    #[arg(long)]
    migrate: bool,

    #[arg(long, env = "DATABASE_URL", help = "Database connection URL")]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    load_dotenv();
    let cli = Cli::parse();

    let mut config = EngineConfig::load().context("Failed to load configuration")?;
    if let Some(url) = cli.database_url {
        config.database.url = url;
    }
    init_logging(&config.logging).context("Failed to initialize logging")?;

    let db = DatabasePool::new(&config.database)
        .await
        .context("Failed to connect to database")?;
    if cli.migrate {
        db.run_migrations()
            .await
            .context("Failed to apply schema")?;
        info!("Schema applied");
    }

    let store = Arc::new(PgStore::new(db.pool().clone()));
    let cache = build_cache_store(&config.cache, &store)
        .await
        .context("Failed to initialize recommendation cache")?;

    let engine = RecommendationEngine::new(
        EngineStores::from_store(store.clone()).with_cache(cache),
        &config,
    );
    let embedder = EmbeddingClient::new(&config.semantic)?;
    let search = SemanticSearchService::new(
        Arc::new(embedder),
        store.clone(),
        store,
        config.semantic.clone(),
    );
    // this process serves no queries, so only persisted artifacts are refreshed
    let jobs = Arc::new(Jobs::offline(
        Arc::new(engine),
        Arc::new(search),
        config.profiles.clone(),
    ));

    match cli.job {
        Some(kind) => {
            if let Some(report) = jobs.run(kind).await? {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            Ok(())
        }
        None => {
            scheduler::run(jobs, config.scheduler, async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await
        }
    }
}
