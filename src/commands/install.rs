use crate::commands::{is_tty, load};
use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::MultiProgress;
use pour::PourError;
use pour::config::Config;
use pour::download;
use pour::evaluator::{Destinations, StepOutcome};
use pour::installer::{self, InstallOptions};
use pour::recipe::InstallStep;
use std::path::Path;

pub async fn install(
    config: &Config,
    recipe_path: &Path,
    archive: Option<&Path>,
    overwrite: bool,
    dry_run: bool,
) -> Result<()> {
    let recipe = load(recipe_path)?;
    let keg = config.keg_path(recipe.name(), recipe.version());

    if dry_run {
        println!("Dry run mode - nothing will be installed");
        println!(
            "{} {} {} -> {}",
            "==>".bold().green(),
            recipe.name().bold(),
            recipe.version(),
            keg.display().to_string().cyan()
        );
        let destinations = Destinations::new(&keg);
        for (i, step) in recipe.steps().iter().enumerate() {
            let detail = match step {
                InstallStep::Copy { into, .. } => destinations.dir(*into),
                InstallStep::Symlink { link, .. } => destinations.resolve(link),
            };
            println!(
                "  {}. {} {}",
                i + 1,
                step.describe(),
                format!("({})", detail.display()).dimmed()
            );
        }
        return Ok(());
    }

    let archive = match archive {
        Some(path) => path.to_path_buf(),
        None => {
            let mp = MultiProgress::new();
            download::fetch_archive(&recipe, config.cache_dir(), is_tty().then_some(&mp))
                .await
                .with_context(|| format!("Failed to fetch archive for {}", recipe.name()))?
        }
    };

    println!(
        "{} Installing {} {}",
        "==>".bold().green(),
        recipe.name().bold(),
        recipe.version()
    );

    let options = InstallOptions { overwrite };
    let installation = match installer::install_from_archive(&recipe, &archive, config, options) {
        Ok(installation) => installation,
        Err(e) => {
            report_failure(&e);
            return Err(e.into());
        }
    };

    for outcome in &installation.report.steps {
        match outcome {
            StepOutcome::Copied { description, files } if files.is_empty() => {
                println!(
                    "  {} {} {}",
                    "⚠".yellow(),
                    description,
                    "(no files matched)".yellow()
                );
            }
            StepOutcome::Copied { description, files } => {
                println!(
                    "  {} {} {}",
                    "✓".green(),
                    description,
                    format!("({} files)", files.len()).dimmed()
                );
            }
            StepOutcome::Linked { description, .. } => {
                println!("  {} {}", "✓".green(), description);
            }
        }
    }

    println!(
        "{} {}: {} files",
        "🍺".bold(),
        installation.keg.display().to_string().cyan(),
        installation.receipt.files.len().to_string().bold()
    );

    Ok(())
}

fn report_failure(error: &PourError) {
    match error {
        PourError::Step {
            index,
            description,
            source,
        } => {
            println!(
                "  {} Step {} ({}) failed: {}",
                "✗".red(),
                index,
                description.bold(),
                source
            );
            println!(
                "  {}",
                "Files written by earlier steps were left in place".dimmed()
            );
        }
        PourError::ChecksumMismatch { .. } => {
            println!("  {} {}", "✗".red(), error);
            println!("  {}", "Nothing was installed".dimmed());
        }
        other => println!("  {} {}", "✗".red(), other),
    }
}
