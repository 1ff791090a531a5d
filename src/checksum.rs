//! SHA-256 verification of downloaded archives

use crate::error::{PourError, Result};
use crate::recipe::Checksum;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Hash a file in 8 KiB chunks and return the lowercase hex digest
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| PourError::fs(path, e))?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0; 8192];

    loop {
        let n = file.read(&mut buffer).map_err(|e| PourError::fs(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Fail with `ChecksumMismatch` unless `path` hashes to `expected`
pub fn verify_file(path: &Path, expected: &Checksum) -> Result<()> {
    let actual = sha256_file(path)?;
    if !expected.matches(&actual) {
        return Err(PourError::ChecksumMismatch {
            path: path.to_path_buf(),
            expected: expected.to_string(),
            actual,
        });
    }
    tracing::debug!("Checksum OK for {}", path.display());
    Ok(())
}
