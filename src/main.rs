use clap::{Parser, Subcommand};
use std::path::PathBuf;

use zfse::config;
use zfse::paths::PathLayout;
use zfse::pipeline::Application;
use zfse::util;

/// Default configuration written by `init`.
const DEFAULT_CONFIG: &str = include_str!("data/config.toml");
/// Example zone file written by `init`.
const EXAMPLE_ZONE_FILE: &str = include_str!("data/example_zone_file.txt");

#[derive(Parser)]
#[command(name = "zfse", about = "Resumable, disk-backed search engine for DNS zone files")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file location
    #[arg(
        long,
        global = true,
        default_value = "./config.toml",
        env = "ZFSE_CONF_FILE_PATH"
    )]
    config: PathBuf,

    /// Cache folder location
    #[arg(long, global = true, default_value = "./cache", env = "ZFSE_CACHE_DIR")]
    cache: PathBuf,

    /// Zone files folder location
    #[arg(
        long = "zoneFiles",
        global = true,
        default_value = "./zone-files",
        env = "ZFSE_ZONE_FILES_DIR"
    )]
    zone_files: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file and an example zone file
    Init,
    /// Execute the pipeline
    Run {
        /// User query to run once after indexing is finished
        #[arg(long)]
        query: Option<String>,

        /// Purge the checkpoint store and all cache files first
        #[arg(long)]
        purge: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // A panic anywhere (stage runner, HTTP handler) means a pipeline
    // invariant broke; exiting beats serving from corrupted state.
    let default_panic_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        default_panic_hook(panic_info);
        std::process::exit(1);
    }));

    let cli = Cli::parse();
    let paths = PathLayout::new(&cli.config, &cli.cache, &cli.zone_files)?;

    match cli.command {
        Commands::Init => initialize_files_and_folders(&paths),
        Commands::Run { query, purge } => {
            if purge {
                purge_cache(&paths)?;
            }

            let app_config = config::load(paths.config_file())?;
            let app = Application::new(app_config, paths)?;
            app.run(query).await
        }
    }
}

fn initialize_files_and_folders(paths: &PathLayout) -> anyhow::Result<()> {
    std::fs::write(paths.config_file(), DEFAULT_CONFIG)?;
    tracing::info!("Wrote default config to {}", paths.config_file().display());

    util::create_folder(paths.cache_dir())?;
    util::create_folder(paths.zone_files_dir())?;

    let example_zone_file = paths.zone_files_dir().join("example_zone_file.txt");
    std::fs::write(&example_zone_file, EXAMPLE_ZONE_FILE)?;
    tracing::info!("Wrote example zone file to {}", example_zone_file.display());

    Ok(())
}

fn purge_cache(paths: &PathLayout) -> anyhow::Result<()> {
    tracing::warn!("Purging application cache folders.");
    util::delete_folder(paths.cache_dir())?;
    tracing::info!("Application cache folders successfully deleted.");
    Ok(())
}
