use clap::{Args, Parser, Subcommand};
use reel_poster::cache::{runner_os, CacheKey, FsCacheStore};
use reel_poster::config::{Config, ConfigArgs};
use reel_poster::logging::init_logging;
use reel_poster::pipeline::MergeAndPostJob;
use reel_poster::runner::{run_with_cache, PostJob};
use reel_poster::tracker::PostedMediaTracker;
use reel_poster::{PostOutcome, Result};
use std::path::PathBuf;
use std::process::ExitCode;

/// Merge a quote video with background music and publish it to a Facebook Page
#[derive(Parser, Debug)]
#[command(name = "reel_poster")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Merge and post videos to a Facebook Page", long_about = None)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Restore the tracker, run the job, save the tracker on success (default)
    Run(KeyArgs),
    /// Run the job against the local tracker without touching the cache
    Post,
    /// Print the tracker cache key and its restore prefix
    CacheKey(KeyArgs),
    /// Print the records in the local tracker
    Tracker,
}

#[derive(Args, Debug, Default)]
struct KeyArgs {
    /// Key the cache on the contents of these files instead of the page id
    #[arg(long = "key-from-sources", num_args = 1..)]
    key_from_sources: Vec<PathBuf>,
}

fn cache_key(config: &Config, args: &KeyArgs) -> Result<CacheKey> {
    if args.key_from_sources.is_empty() {
        Ok(CacheKey::stable(&runner_os(), &config.cache_namespace()))
    } else {
        CacheKey::from_sources(&runner_os(), &args.key_from_sources)
    }
}

fn report(outcome: &PostOutcome) {
    match outcome {
        PostOutcome::Posted { merged_url, facebook_video_id, .. } => tracing::info!(
            "🎉 Video posted: {} (Facebook id: {})",
            merged_url,
            facebook_video_id.as_deref().unwrap_or("unknown")
        ),
        PostOutcome::AlreadyPosted { merged_url } => {
            tracing::info!("Nothing new published; {} was already posted", merged_url)
        }
    }
}

async fn dispatch(config: Config, command: Commands) -> Result<()> {
    match command {
        Commands::Run(args) => {
            let key = cache_key(&config, &args)?;
            let store = FsCacheStore::new(&config.cache_dir);
            let tracker_path = config.tracker_path.clone();
            let job = MergeAndPostJob::from_config(config)?;
            let run = run_with_cache(&store, &key, &tracker_path, &job).await?;
            if let Some(hit) = &run.restored_from {
                tracing::info!("Tracker restored from {}", hit.key());
            }
            report(&run.outcome);
            tracing::info!("Tracker cached under {}", run.saved_key);
        }
        Commands::Post => {
            let tracker_path = config.tracker_path.clone();
            let job = MergeAndPostJob::from_config(config)?;
            report(&job.run(&tracker_path).await?);
        }
        Commands::CacheKey(args) => {
            let key = cache_key(&config, &args)?;
            println!("key={}", key.key);
            println!("restore-keys={}", key.restore_prefix);
        }
        Commands::Tracker => {
            let tracker = PostedMediaTracker::load(&config.tracker_path)?;
            println!("{}", serde_json::to_string_pretty(tracker.records())?);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    if let Err(e) = init_logging() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let cli = Cli::parse();
    let config = Config::from_args(cli.config);
    let command = cli.command.unwrap_or(Commands::Run(KeyArgs::default()));

    let result = dispatch(config, command).await;
    match result {
        Ok(()) => {
            tracing::info!("--- Automated process finished ---");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}
