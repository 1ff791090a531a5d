//! Library interface for the pour installer
//!
//! A recipe is loaded with [`formula::load_recipe`], its archive fetched with
//! [`download::fetch_archive`] and installed with
//! [`installer::install_from_archive`].

pub mod cellar;
pub mod checksum;
pub mod config;
pub mod download;
pub mod error;
pub mod evaluator;
pub mod extract;
pub mod formula;
pub mod installer;
pub mod receipt;
pub mod recipe;
pub mod symlink;

// Re-export commonly used items
pub use error::{PourError, Result};
pub use evaluator::{InstallReport, copy_matching, execute};
pub use recipe::{InstallRecipe, InstallStep, LocatedPath, Location};
pub use symlink::{create_symlink, normalize_path};
