//! Command implementations for the pour CLI
//!
//! - **install**: fetch, verify and install a recipe into its keg
//! - **fetch**: download and verify archives without installing
//! - **verify**: check an archive against a recipe's checksum
//! - **info**: show a parsed recipe
//! - **config**: show resolved paths and installed kegs

pub mod config;
pub mod fetch;
pub mod info;
pub mod install;
pub mod verify;

pub use config::config;
pub use fetch::fetch;
pub use info::info;
pub use install::install;
pub use verify::verify;

use anyhow::{Context, Result};
use pour::InstallRecipe;
use std::path::Path;

pub(crate) fn load(path: &Path) -> Result<InstallRecipe> {
    pour::formula::load_recipe(path)
        .with_context(|| format!("Failed to load recipe: {}", path.display()))
}

pub(crate) fn is_tty() -> bool {
    std::io::IsTerminal::is_terminal(&std::io::stdout())
}
