use std::net::IpAddr;
use std::path::PathBuf;

use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use snapdeck::{api, client::StudyClient, config::Config, db, study::StudyManager};

#[derive(Parser)]
#[command(name = "snapdeck")]
#[command(about = "Spaced-repetition study server for flashcard decks")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the Snapdeck server
    Serve {
        /// Address to bind (overrides SNAPDECK_HOST)
        #[arg(long)]
        host: Option<IpAddr>,

        /// Port for HTTP API (overrides SNAPDECK_PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Database file (overrides SNAPDECK_DB_PATH)
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Check server status
    Status,
    /// List decks on the running server
    Decks,
    /// Delete completed study sessions older than the cut-off
    PruneSessions {
        #[arg(long, default_value = "30")]
        older_than_days: u32,

        /// Database file (overrides SNAPDECK_DB_PATH)
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

/// Initialize tracing with output to stderr (client commands) or stdout
fn init_tracing(use_stderr: bool) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "snapdeck=debug,tower_http=debug".into()),
    );

    if use_stderr {
        // Client commands print results on stdout
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

fn open_database(config: &Config) -> anyhow::Result<db::Database> {
    let db = db::Database::open(config.resolve_db_path()?)?;
    db.migrate()?;
    Ok(db)
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let db = open_database(&config)?;
    let study = StudyManager::from_config(db, &config)?;
    let app = api::create_router(study, &config);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Snapdeck server listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let use_stderr = matches!(cli.command, Some(Commands::Status | Commands::Decks));
    init_tracing(use_stderr);

    let mut config = Config::from_env();

    match cli.command {
        Some(Commands::Serve { host, port, db }) => {
            config.host = host.unwrap_or(config.host);
            config.port = port.unwrap_or(config.port);
            config.db_path = db.or(config.db_path);
            serve(config).await?;
        }
        Some(Commands::Status) => {
            let client = StudyClient::from_env();
            match client.health().await {
                Ok(health) => println!(
                    "Snapdeck {} is {} at {}",
                    health.version,
                    health.status,
                    client.base_url()
                ),
                Err(e) => {
                    println!("Snapdeck server is not reachable at {}", client.base_url());
                    tracing::debug!("Health check failed: {}", e);
                }
            }
        }
        Some(Commands::Decks) => {
            let client = StudyClient::from_env();
            let decks = client.list_decks().await?;
            if decks.is_empty() {
                println!("No decks");
            }
            for deck in decks {
                println!(
                    "{}  {}  ({} cards, {} due, {} new)",
                    deck.id, deck.name, deck.total_cards, deck.due_cards, deck.new_cards
                );
            }
        }
        Some(Commands::PruneSessions {
            older_than_days,
            db,
        }) => {
            config.db_path = db.or(config.db_path);
            let db = open_database(&config)?;
            let study = StudyManager::from_config(db, &config)?;
            let cutoff = Utc::now() - Duration::days(older_than_days as i64);
            let removed = study.sessions().prune_completed(cutoff)?;
            println!("Removed {} completed sessions", removed);
        }
        None => {
            serve(config).await?;
        }
    }

    Ok(())
}
