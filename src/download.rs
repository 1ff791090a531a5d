//! Fetching recipe archives into the download cache.
//!
//! `file://` urls are used in place. `http(s)` urls are streamed to
//! `<cache>/<name>--<version>--<file>` and verified before they are handed
//! back; a cached file that still verifies is reused without a request.

use crate::checksum;
use crate::error::{PourError, Result};
use crate::recipe::InstallRecipe;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Where an archive comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveSource {
    Local(PathBuf),
    Remote(url::Url),
}

impl ArchiveSource {
    pub fn for_recipe(recipe: &InstallRecipe) -> Result<Self> {
        let url = url::Url::parse(recipe.url())
            .map_err(|e| PourError::InvalidRecipe(format!("bad url {}: {}", recipe.url(), e)))?;
        if url.scheme() == "file" {
            let path = url.to_file_path().map_err(|_| {
                PourError::InvalidRecipe(format!("bad file url: {}", recipe.url()))
            })?;
            Ok(ArchiveSource::Local(path))
        } else {
            Ok(ArchiveSource::Remote(url))
        }
    }
}

/// Checksum on the blocking pool so large archives don't stall the runtime
async fn verify(path: &Path, recipe: &InstallRecipe) -> Result<()> {
    let path = path.to_path_buf();
    let expected = recipe.sha256().clone();
    tokio::task::spawn_blocking(move || checksum::verify_file(&path, &expected))
        .await
        .map_err(|e| PourError::Other(e.into()))?
}

/// Return a verified local copy of the recipe's archive
pub async fn fetch_archive(
    recipe: &InstallRecipe,
    cache: &Path,
    progress: Option<&MultiProgress>,
) -> Result<PathBuf> {
    let url = match ArchiveSource::for_recipe(recipe)? {
        ArchiveSource::Local(path) => {
            verify(&path, recipe).await?;
            return Ok(path);
        }
        ArchiveSource::Remote(url) => url,
    };

    fs::create_dir_all(cache)
        .await
        .map_err(|e| PourError::fs(cache, e))?;
    let output_path = cache.join(recipe.cache_file_name());

    // Reuse a cached download if it still verifies
    if output_path.exists() {
        match verify(&output_path, recipe).await {
            Ok(()) => {
                tracing::debug!("Using cached {}", output_path.display());
                return Ok(output_path);
            }
            Err(PourError::ChecksumMismatch { .. }) => {
                tracing::warn!("Discarding stale download {}", output_path.display());
                fs::remove_file(&output_path)
                    .await
                    .map_err(|e| PourError::fs(&output_path, e))?;
            }
            Err(e) => return Err(e),
        }
    }

    let pb = progress.map(|mp| {
        let pb = mp.add(ProgressBar::new(0));
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.set_message(format!("⬇ {}", recipe.name()));
        pb
    });

    tracing::info!("Downloading {}", url);
    let client = reqwest::Client::new();
    let mut response = client.get(url.clone()).send().await?.error_for_status()?;

    if let (Some(pb), Some(total)) = (&pb, response.content_length()) {
        pb.set_length(total);
    }

    // Write to a partial file so an interrupted download never looks cached
    let partial = output_path.with_extension("incomplete");
    let mut file = fs::File::create(&partial)
        .await
        .map_err(|e| PourError::fs(&partial, e))?;
    let mut downloaded: u64 = 0;

    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk)
            .await
            .map_err(|e| PourError::fs(&partial, e))?;
        downloaded += chunk.len() as u64;
        if let Some(pb) = &pb {
            pb.set_position(downloaded);
        }
    }
    file.flush().await.map_err(|e| PourError::fs(&partial, e))?;
    drop(file);

    if let Some(pb) = &pb {
        pb.finish_with_message(format!("✓ {}", recipe.name()));
    }

    if let Err(e) = verify(&partial, recipe).await {
        let _ = fs::remove_file(&partial).await;
        return Err(e);
    }
    fs::rename(&partial, &output_path)
        .await
        .map_err(|e| PourError::fs(&output_path, e))?;

    Ok(output_path)
}

/// Fetch several archives concurrently; one result per recipe, in order
pub async fn fetch_archives(
    recipes: &[InstallRecipe],
    cache: &Path,
    show_progress: bool,
) -> Vec<(String, Result<PathBuf>)> {
    let mp = MultiProgress::new();
    let progress = show_progress.then_some(&mp);

    let downloads = recipes.iter().map(|recipe| async move {
        let result = fetch_archive(recipe, cache, progress).await;
        (recipe.name().to_string(), result)
    });

    futures::future::join_all(downloads).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::{InstallStep, Location, RecipeDraft};

    #[test]
    fn test_source_for_recipe() {
        let remote = RecipeDraft {
            name: "foo".to_string(),
            url: "https://example.com/foo-1.0.tar.gz".to_string(),
            sha256: "0".repeat(64),
            steps: vec![InstallStep::copy("lib/*", Location::Lib)],
            ..Default::default()
        }
        .build()
        .unwrap();
        assert!(matches!(
            ArchiveSource::for_recipe(&remote).unwrap(),
            ArchiveSource::Remote(_)
        ));

        let local = RecipeDraft {
            name: "foo".to_string(),
            url: "file:///tmp/foo-1.0.tar.gz".to_string(),
            sha256: "0".repeat(64),
            steps: vec![InstallStep::copy("lib/*", Location::Lib)],
            ..Default::default()
        }
        .build()
        .unwrap();
        assert_eq!(
            ArchiveSource::for_recipe(&local).unwrap(),
            ArchiveSource::Local(PathBuf::from("/tmp/foo-1.0.tar.gz"))
        );
    }
}
