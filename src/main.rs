mod colors;
mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use pour::config::Config;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pour")]
#[command(author, version, about = "Install prebuilt packages from Homebrew-style recipes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Install prefix (overrides POUR_PREFIX and HOMEBREW_PREFIX)
    #[arg(long, global = true)]
    prefix: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, verify and install a recipe
    Install {
        /// Recipe file (.rb formula or .json recipe)
        recipe: PathBuf,

        /// Use this archive instead of downloading the recipe's url
        #[arg(long)]
        archive: Option<PathBuf>,

        /// Replace files that already exist in the keg
        #[arg(long)]
        overwrite: bool,

        /// Show what would be installed without touching anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Download and verify archives without installing
    Fetch {
        /// Recipe files
        #[arg(required = true)]
        recipes: Vec<PathBuf>,
    },

    /// Check an archive against a recipe's checksum
    Verify {
        /// Recipe file
        recipe: PathBuf,

        /// Archive to check
        archive: PathBuf,
    },

    /// Show information about a recipe
    Info {
        /// Recipe file
        recipe: PathBuf,

        /// Print the recipe as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show resolved configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    colors::init_colors();

    let config = Config::from_env().with_prefix(cli.prefix);

    match cli.command {
        Some(Commands::Install {
            recipe,
            archive,
            overwrite,
            dry_run,
        }) => {
            commands::install(&config, &recipe, archive.as_deref(), overwrite, dry_run).await?;
        }
        Some(Commands::Fetch { recipes }) => {
            commands::fetch(&config, &recipes).await?;
        }
        Some(Commands::Verify { recipe, archive }) => {
            commands::verify(&recipe, &archive)?;
        }
        Some(Commands::Info { recipe, json }) => {
            commands::info(&config, &recipe, json)?;
        }
        Some(Commands::Config) => {
            commands::config(&config)?;
        }
        None => {
            println!("{} pour - install prebuilt packages from recipes", "==>".bold().green());
            println!("\nRun {} to see available commands.", "pour --help".cyan());
        }
    }

    Ok(())
}
