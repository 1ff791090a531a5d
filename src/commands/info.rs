use crate::commands::load;
use anyhow::Result;
use colored::Colorize;
use pour::config::Config;
use pour::receipt::InstallReceipt;
use std::path::Path;

/// Show a recipe, or print it as JSON
pub fn info(config: &Config, recipe_path: &Path, json: bool) -> Result<()> {
    let recipe = load(recipe_path)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&recipe)?);
        return Ok(());
    }

    println!(
        "{} {}: {}",
        "==>".bold().green(),
        recipe.name().bold(),
        recipe.version()
    );
    if let Some(desc) = recipe.desc() {
        println!("{}", desc);
    }
    if let Some(homepage) = recipe.homepage() {
        println!("{}", homepage.cyan());
    }
    println!();

    println!("{}", "Source:".bold());
    println!("  {}: {}", "url".dimmed(), recipe.url());
    println!("  {}: {}", "sha256".dimmed(), recipe.sha256());
    println!();

    println!("{}", "Install steps:".bold());
    for (i, step) in recipe.steps().iter().enumerate() {
        println!("  {}. {}", i + 1, step.describe());
    }
    println!();

    let keg = config.keg_path(recipe.name(), recipe.version());
    match InstallReceipt::read(&keg) {
        Ok(receipt) => println!(
            "{} {} ({} files, {})",
            "Installed:".bold(),
            keg.display().to_string().cyan(),
            receipt.files.len(),
            receipt.installed_at()
        ),
        Err(_) if keg.exists() => println!(
            "{} {} {}",
            "Installed:".bold(),
            keg.display().to_string().cyan(),
            "(incomplete, no receipt)".yellow()
        ),
        Err(_) => println!("{} {}", "Installed:".bold(), "no".dimmed()),
    }

    Ok(())
}
