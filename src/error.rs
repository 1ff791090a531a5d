use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PourError {
    #[error("Checksum mismatch for {}: expected {expected}, got {actual}", path.display())]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("Refusing to overwrite existing file: {}", path.display())]
    Conflict { path: PathBuf },

    #[error("Symlink path already exists: {}", path.display())]
    PathExists { path: PathBuf },

    #[error("Symlink target does not exist: {}", path.display())]
    MissingTarget { path: PathBuf },

    #[error("Filesystem error at {}: {source}", path.display())]
    FileSystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid recipe: {0}")]
    InvalidRecipe(String),

    #[error("Formula parse error on line {line}: {message}")]
    FormulaParse { line: usize, message: String },

    #[error("Invalid glob pattern: {0}")]
    Glob(#[from] glob::PatternError),

    #[error("Download failed: {0}")]
    Download(#[from] reqwest::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Step {index} ({description}) failed: {source}")]
    Step {
        index: usize,
        description: String,
        #[source]
        source: Box<PourError>,
    },

    #[error("Error: {0}")]
    Other(#[from] anyhow::Error),
}

impl PourError {
    /// Wrap an `io::Error` with the path it happened on
    pub fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PourError::FileSystem {
            path: path.into(),
            source,
        }
    }

    /// The underlying failure, looking through step wrappers
    pub fn root(&self) -> &PourError {
        match self {
            PourError::Step { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, PourError>;
