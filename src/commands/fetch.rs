use crate::commands::{is_tty, load};
use anyhow::Result;
use colored::Colorize;
use pour::config::Config;
use pour::download;
use std::path::PathBuf;

/// Download and verify archives for one or more recipes
pub async fn fetch(config: &Config, recipe_paths: &[PathBuf]) -> Result<()> {
    let recipes = recipe_paths
        .iter()
        .map(|path| load(path))
        .collect::<Result<Vec<_>>>()?;

    let results = download::fetch_archives(&recipes, config.cache_dir(), is_tty()).await;

    let mut failed = 0;
    for (name, result) in &results {
        match result {
            Ok(path) => println!(
                "  {} {} {}",
                "✓".green(),
                name.bold().green(),
                path.display().to_string().dimmed()
            ),
            Err(e) => {
                failed += 1;
                println!("  {} {}: {}", "✗".red(), name.bold(), e);
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} downloads failed", failed, results.len());
    }

    println!(
        "{} Fetched {} archives into {}",
        "✓".green(),
        results.len().to_string().bold(),
        config.cache_dir().display().to_string().dimmed()
    );
    Ok(())
}
