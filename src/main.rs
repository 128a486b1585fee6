use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::runtime::Handle;
use tracing::info;

use gmaven_index::config::{Config, DataPaths};
use gmaven_index::index::fetcher::IndexFetcher;
use gmaven_index::logging::init_logging;
use gmaven_index::registry::manager::RegistryManager;
use gmaven_index::registry::{LookupOptions, SourceLanguage};

#[derive(Parser)]
#[command(name = "gmaven-index")]
#[command(version, about = "Keeps a Maven class index fresh and suggests artifacts for symbols")]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Mirror log output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one refresh cycle, retries included
    Refresh,
    /// Print import candidates for an unresolved class or function name
    Lookup {
        name: String,
        /// Receiver type, for extension functions
        #[arg(long)]
        receiver: Option<String>,
        /// The consuming file is Kotlin (prefer ktx artifacts)
        #[arg(long)]
        kotlin: bool,
        /// Do not suggest androidx artifacts
        #[arg(long)]
        no_androidx: bool,
        /// Fold KMP platform artifacts into their base artifact
        #[arg(long)]
        map_kmp: bool,
    },
    /// Keep the index fresh until interrupted
    Watch,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let _guard = init_logging(&DataPaths::from_env().log_file(), cli.verbose)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(cli.command, config))
}

async fn run(command: Command, config: Config) -> anyhow::Result<()> {
    let fetcher = Arc::new(IndexFetcher::from_config(&config)?);

    match command {
        Command::Refresh => match fetcher.refresh_with_retries().await {
            Some(outcome) => println!("{:?}", outcome),
            None => anyhow::bail!(
                "Index refresh failed after {} attempts",
                fetcher.refresh_state().consecutive_failures
            ),
        },
        Command::Lookup {
            name,
            receiver,
            kotlin,
            no_androidx,
            map_kmp,
        } => {
            let manager = RegistryManager::new(fetcher, Handle::current());
            let registry = manager.get_maven_class_registry().await?;
            let options = LookupOptions {
                use_androidx: !no_androidx,
                language: Some(if kotlin {
                    SourceLanguage::Kotlin
                } else {
                    SourceLanguage::Java
                }),
                map_kmp_artifacts: map_kmp,
            };
            let candidates = registry.find_library_data(&name, receiver.as_deref(), &options);
            println!("{}", serde_json::to_string_pretty(&candidates)?);
        }
        Command::Watch => {
            let manager = Arc::new(RegistryManager::new(fetcher.clone(), Handle::current()));
            manager.get_maven_class_registry().await?;

            // Registered after the manager's own listener, so the registry is already
            // invalidated when this runs.
            let weak = Arc::downgrade(&manager);
            let _rebuild = fetcher.add_listener(move || {
                if let Some(manager) = weak.upgrade() {
                    manager.try_get_maven_class_registry();
                }
            });
            let _refresh = fetcher.start();

            tokio::signal::ctrl_c().await?;
            info!("Interrupted, shutting down");
        }
    }

    Ok(())
}
