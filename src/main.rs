use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod cli;

#[derive(Parser)]
#[command(name = "recipe-cam")]
#[command(about = "Photograph food and get recipes for it")]
#[command(version)]
struct Cli {
    /// Favorites file (overrides RECIPE_CAM_FAVORITES_PATH)
    #[arg(long, global = true)]
    favorites_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture one photo, analyse it and print the outcome as JSON
    Scan {
        /// Analyse this photo instead of a live camera
        #[arg(short, long)]
        photo: Option<PathBuf>,

        /// Analysis deadline in milliseconds (overrides RECIPE_CAM_DEADLINE_MS)
        #[arg(short, long)]
        deadline_ms: Option<u64>,

        /// Toggle a returned recipe as favorite, by id (repeatable)
        #[arg(short, long = "favorite", value_name = "ID")]
        favorite: Vec<String>,
    },

    /// List saved favorite recipes
    Favorites,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Set RUST_LOG to control log level, e.g. RUST_LOG=recipe_cam_lib=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("recipe_cam_lib=info")),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = recipe_cam_lib::config::AppConfig::from_env();
    if let Some(path) = cli.favorites_path {
        config.favorites_path = path;
    }

    match cli.command {
        Commands::Scan {
            photo,
            deadline_ms,
            favorite,
        } => {
            if let Some(ms) = deadline_ms {
                config.deadline = std::time::Duration::from_millis(ms);
            }
            cli::scan(&config, photo, &favorite).await
        }
        Commands::Favorites => cli::list_favorites(&config),
    }
}
