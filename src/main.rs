//! Bet Tracker
//!
//! Usage:
//!   bet-tracker users add Nikh
//!   bet-tracker analyze --user Nikh slip1.jpg slip2.png
//!   bet-tracker summary --user Nikh --unit-size 10
//!   bet-tracker serve --port 8080
//!
//! Environment:
//!   OPENAI_API_KEY - Vision API key (required for `analyze` and slip uploads)
//!   OPENAI_ORG_ID - Optional organization header
//!   DATABASE_PATH - SQLite ledger file (default: ./bet_tracker.db)
//!   BET_TRACKER_CONFIG - Optional TOML config file

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bet_tracker::{
    api::{create_router, AppState},
    config::TrackerConfig,
    ledger::{
        cumulative_series, legacy_csv::read_legacy_csv, summarize, LedgerStore,
        MemoryLedgerStore, SqliteLedgerStore,
    },
    report,
    tracker::SlipTracker,
    vision::{OpenAiVisionClient, SlipExtractor, SlipImage},
    UserIdentity,
};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "bet-tracker")]
#[command(about = "Track wagers read off betting-slip photos")]
struct Cli {
    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite ledger file (overrides config)
    #[arg(long, global = true)]
    db_path: Option<String>,

    /// Keep the ledger in memory for this run only
    #[arg(long, global = true)]
    in_memory: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage known users
    Users {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Send slip images to the vision model and record the results
    Analyze {
        #[arg(short, long, env = "BET_TRACKER_USER")]
        user: UserIdentity,

        /// Slip images, processed in order
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },

    /// Record a saved model reply (file path, or `-` for stdin)
    Record {
        #[arg(short, long, env = "BET_TRACKER_USER")]
        user: UserIdentity,

        input: PathBuf,
    },

    /// Lifetime totals, record and units
    Summary {
        #[arg(short, long, env = "BET_TRACKER_USER")]
        user: UserIdentity,

        /// Currency amount of one unit
        #[arg(long)]
        unit_size: Option<f64>,
    },

    /// Full ledger
    History {
        #[arg(short, long, env = "BET_TRACKER_USER")]
        user: UserIdentity,
    },

    /// Cumulative profit chart over dated wagers
    Chart {
        #[arg(short, long, env = "BET_TRACKER_USER")]
        user: UserIdentity,
    },

    /// Import a legacy betting_results.csv file
    ImportCsv {
        #[arg(short, long, env = "BET_TRACKER_USER")]
        user: UserIdentity,

        file: PathBuf,
    },

    /// Run the HTTP API
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
}

#[derive(Subcommand, Debug)]
enum UserAction {
    /// List known users
    List,
    /// Register a new user
    Add { name: String },
}

/// Stand-in extractor when no vision credentials are configured.
struct VisionDisabled(String);

#[async_trait]
impl SlipExtractor for VisionDisabled {
    async fn extract(&self, _image: &SlipImage) -> Result<String> {
        Err(anyhow!("vision extraction unavailable: {}", self.0))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = TrackerConfig::load(cli.config.as_deref())?;
    if let Some(path) = cli.db_path {
        config.database_path = path;
    }

    let store: Arc<dyn LedgerStore> = if cli.in_memory {
        Arc::new(MemoryLedgerStore::new())
    } else {
        Arc::new(
            SqliteLedgerStore::open(&config.database_path)
                .with_context(|| format!("opening ledger {}", config.database_path))?,
        )
    };

    match cli.command {
        Commands::Users { action } => match action {
            UserAction::List => {
                let users = store.list_users()?;
                if users.is_empty() {
                    println!("No users yet");
                }
                for user in users {
                    println!("{}", user);
                }
            }
            UserAction::Add { name } => {
                let user = store.add_user(&name)?;
                println!("Added user {}", user);
            }
        },
        Commands::Analyze { user, images } => {
            let tracker = SlipTracker::new(store, vision_extractor(&config)?);
            analyze(&tracker, &user, &images, config.default_unit_size).await;
        }
        Commands::Record { user, input } => {
            let reply = read_input(&input)?;
            let tracker = SlipTracker::new(store, Arc::new(VisionDisabled("not needed".into())));
            let result = tracker.record_reply(&user, reply);
            print!("{}", report::render_slip_outcome(&input.display().to_string(), &result));
        }
        Commands::Summary { user, unit_size } => {
            let records = store.read(&user)?;
            let metrics = summarize(&records, unit_size.unwrap_or(config.default_unit_size));
            print!("{}", report::render_summary(user.as_str(), &metrics));
        }
        Commands::History { user } => {
            print!("{}", report::render_ledger(&store.read(&user)?));
        }
        Commands::Chart { user } => {
            print!("{}", report::render_chart(&cumulative_series(&store.read(&user)?)));
        }
        Commands::ImportCsv { user, file } => {
            let reader = std::fs::File::open(&file)
                .with_context(|| format!("opening {}", file.display()))?;
            let import = read_legacy_csv(reader)?;
            let written = store.append(&user, &import.records)?;
            println!(
                "Imported {} wager(s) for {} ({} row(s) skipped)",
                written, user, import.skipped
            );
        }
        Commands::Serve { port } => {
            let extractor: Arc<dyn SlipExtractor> = match vision_extractor(&config) {
                Ok(extractor) => extractor,
                Err(e) => {
                    warn!("slip uploads disabled: {:#}", e);
                    Arc::new(VisionDisabled(format!("{:#}", e)))
                }
            };
            let state = AppState {
                tracker: SlipTracker::new(store, extractor),
                default_unit_size: config.default_unit_size,
            };
            serve(state, port.unwrap_or(config.port)).await?;
        }
    }

    Ok(())
}

async fn analyze(tracker: &SlipTracker, user: &UserIdentity, images: &[PathBuf], unit_size: f64) {
    let mut slips = Vec::with_capacity(images.len());
    for path in images {
        match SlipImage::from_path(path) {
            Ok(image) => slips.push(image),
            Err(e) => println!("{}: could not process this slip: {:#}", path.display(), e),
        }
    }

    let batch = tracker.process_batch(user, &slips).await;
    for outcome in &batch.outcomes {
        print!("{}", report::render_slip_outcome(&outcome.slip, &outcome.result));
    }

    match tracker.view(user, unit_size) {
        Ok(view) => print!("{}", report::render_summary(user.as_str(), &view.metrics)),
        Err(e) => println!("could not load ledger: {}", e),
    }
}

fn vision_extractor(config: &TrackerConfig) -> Result<Arc<dyn SlipExtractor>> {
    let client = OpenAiVisionClient::from_env(reqwest::Client::new(), config.vision.clone())?;
    Ok(Arc::new(client))
}

fn read_input(input: &Path) -> Result<String> {
    if input.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("reading stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(input).with_context(|| format!("reading {}", input.display()))
}

async fn serve(state: AppState, port: u16) -> Result<()> {
    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("binding port {}", port))?;
    info!("Bet tracker API listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("http server")?;
    Ok(())
}

/// Logs go to stderr so reports on stdout stay clean.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bet_tracker=info,tower_http=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
