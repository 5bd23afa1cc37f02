use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use study_companion::config::AppConfig;
use study_companion::progress::ProgressAggregator;
use study_companion::scheduler::Scheduler;
use study_companion::{api, db};

const DEFAULT_PORT: u16 = 3000;

#[derive(Parser)]
#[command(name = "study")]
#[command(about = "Spaced-repetition study companion for lecture notes")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Port for HTTP API
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },
    /// Apply pending database migrations and exit
    Migrate,
    /// Print study progress for a document
    Progress {
        document_id: Uuid,
    },
    /// Print the next question to study for a document
    Next {
        document_id: Uuid,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG")
            .unwrap_or_else(|_| "study_companion=debug,tower_http=debug".into()),
    );

    // Logs go to stderr so `progress` and `next` output stays clean on stdout
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn open_database(config: &AppConfig) -> anyhow::Result<db::Database> {
    let db = match &config.database_path {
        Some(path) => db::Database::open(path.clone())
            .with_context(|| format!("Failed to open database at {}", path.display()))?,
        None => db::Database::open_default().context("Failed to open default database")?,
    };
    db.migrate().context("Failed to run migrations")?;
    Ok(db)
}

async fn serve(config: &AppConfig, port: u16) -> anyhow::Result<()> {
    tracing::info!("Starting study companion server on port {}", port);

    let db = open_database(config)?;
    let app = api::create_router(db, config);

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    tracing::info!(
        "Study companion listening on http://127.0.0.1:{}/api/v1",
        port
    );

    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = AppConfig::from_env();

    match cli.command {
        Some(Commands::Serve { port }) => serve(&config, port).await?,
        Some(Commands::Migrate) => {
            open_database(&config)?;
            tracing::info!("Database is up to date");
        }
        Some(Commands::Progress { document_id }) => {
            let db = open_database(&config)?;
            let summary = ProgressAggregator::with_config(db, &config.scheduler)
                .compute_progress(document_id)?;

            println!("Concepts:    {}", summary.total_concepts);
            println!(
                "Reviewed:    {} ({} correct, {} incorrect)",
                summary.reviewed, summary.correct, summary.incorrect
            );
            println!("Accuracy:    {}%", summary.accuracy);
            println!("Completion:  {}%", summary.completion_percentage);
            println!("Standing:    {}", summary.recommendation.as_str());
            for line in summary.recommendation.advice() {
                println!("  - {}", line);
            }
        }
        Some(Commands::Next { document_id }) => {
            let db = open_database(&config)?;
            let scheduler = match config.rng_seed {
                Some(seed) => Scheduler::with_seed(db, seed),
                None => Scheduler::new(db),
            }
            .with_config(config.scheduler.clone());

            match scheduler.pick_next_due(document_id)? {
                Some(question) => println!("[{}] {}", question.id, question.prompt),
                None => println!("No questions available"),
            }
        }
        None => serve(&config, DEFAULT_PORT).await?,
    }

    Ok(())
}
