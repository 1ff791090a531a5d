//! The install pipeline: verify, stage, evaluate, record.
//!
//! Verification happens before anything is created: a checksum mismatch
//! leaves no staging directory and no keg behind.

use crate::checksum;
use crate::config::Config;
use crate::error::Result;
use crate::evaluator::{self, Destinations, InstallReport};
use crate::extract;
use crate::receipt::InstallReceipt;
use crate::recipe::InstallRecipe;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Copy, Default)]
pub struct InstallOptions {
    /// Let copy steps replace files that already exist
    pub overwrite: bool,
}

/// A finished install
#[derive(Debug, Clone)]
pub struct Installation {
    pub keg: PathBuf,
    pub report: InstallReport,
    pub receipt: InstallReceipt,
}

/// Install `recipe` from an archive that is already on disk
pub fn install_from_archive(
    recipe: &InstallRecipe,
    archive: &Path,
    config: &Config,
    options: InstallOptions,
) -> Result<Installation> {
    checksum::verify_file(archive, recipe.sha256())?;

    let staging = extract::extract_archive(archive)?;

    let keg = config.keg_path(recipe.name(), recipe.version());
    let destinations = Destinations::new(&keg);
    destinations.prepare(recipe)?;

    info!(
        "Installing {} {} into {}",
        recipe.name(),
        recipe.version(),
        keg.display()
    );
    let report = evaluator::execute(recipe, staging.root(), &destinations, options.overwrite)?;

    let receipt = InstallReceipt::new(recipe, &keg, &report);
    receipt.write(&keg)?;

    Ok(Installation {
        keg,
        report,
        receipt,
    })
}
