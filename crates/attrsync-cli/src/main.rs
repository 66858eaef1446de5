//! Command line entrypoints for attribution syncs: one table, one client,
//! the full fan-out, or just the migrations.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use attrsync_sync::{JobDirective, JobRunner, WindowBounds};

#[derive(Debug, Parser)]
#[command(name = "attrsync")]
#[command(about = "Ad-attribution sync runner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Sync one direct-API table family
    Sync {
        /// Table key (e.g. facebook_adset, google_campaign)
        #[arg(long)]
        table: String,
        /// Explicit window start (YYYY-MM-DD); defaults to the watermark
        #[arg(long)]
        start: Option<String>,
        /// Explicit window end (YYYY-MM-DD); defaults to today
        #[arg(long)]
        end: Option<String>,
    },
    /// Sync the report-export table for one registered client
    Scrape {
        /// Client name from config/clients.yaml
        #[arg(long)]
        client: String,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
    },
    /// Run every configured job sequentially
    Tasks {
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
    },
    /// Apply pending database migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = attrsync_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    let pool_config = attrsync_warehouse::PoolConfig::from_app_config(&config);
    let pool = attrsync_warehouse::connect_pool(&config.database_url, pool_config).await?;
    attrsync_warehouse::run_migrations(&pool).await?;

    if matches!(cli.command, Commands::Migrate) {
        println!("migrations up to date");
        return Ok(());
    }

    let clients = attrsync_core::load_clients(&config.clients_path)?;
    let runner = JobRunner::new(config, clients, attrsync_warehouse::Warehouse::new(pool));

    match cli.command {
        Commands::Sync { table, start, end } => {
            let bounds = WindowBounds::parse(start.as_deref(), end.as_deref())?;
            let summary = runner
                .run(&JobDirective::Table(table), bounds)
                .await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Scrape { client, start, end } => {
            let bounds = WindowBounds::parse(start.as_deref(), end.as_deref())?;
            let summary = runner
                .run(&JobDirective::Client(client), bounds)
                .await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Tasks { start, end } => {
            let bounds = WindowBounds::parse(start.as_deref(), end.as_deref())?;
            let mut failed = 0usize;
            let jobs = runner.all_jobs();
            let total = jobs.len();
            for directive in jobs {
                match runner.run(&directive, bounds).await {
                    Ok(summary) => {
                        println!("{directive}: {}", serde_json::to_string(&summary)?);
                    }
                    Err(error) => {
                        tracing::error!(job = %directive, error = %error, "sync failed");
                        failed += 1;
                    }
                }
            }
            if failed > 0 {
                anyhow::bail!("{failed} of {total} jobs failed");
            }
        }
        // Handled before the runner is built.
        Commands::Migrate => {}
    }

    Ok(())
}
