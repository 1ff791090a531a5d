use crate::commands::load;
use anyhow::Result;
use colored::Colorize;
use pour::PourError;
use pour::checksum;
use std::path::Path;

/// Check an archive on disk against a recipe's sha256
pub fn verify(recipe_path: &Path, archive: &Path) -> Result<()> {
    let recipe = load(recipe_path)?;

    match checksum::verify_file(archive, recipe.sha256()) {
        Ok(()) => {
            println!(
                "{} {} matches {}",
                "✓".green(),
                archive.display(),
                recipe.name().bold()
            );
            Ok(())
        }
        Err(PourError::ChecksumMismatch {
            expected, actual, ..
        }) => {
            println!("{} {}", "✗".red(), archive.display());
            println!("  {}: {}", "expected".dimmed(), expected);
            println!("  {}: {}", "actual".dimmed(), actual.red());
            anyhow::bail!("Checksum mismatch for {}", recipe.name())
        }
        Err(e) => Err(e.into()),
    }
}
