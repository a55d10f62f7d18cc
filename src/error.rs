use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LevelError {
    #[error("malformed level data: {0}")]
    MalformedData(String),
    #[error("level file not found: {}", .0.display())]
    FileAbsent(PathBuf),
    #[error("no asset registered for tile '{kind}' variant {variant}")]
    AssetNotFound { kind: String, variant: usize },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for LevelError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            Self::Io(err.into())
        } else {
            Self::MalformedData(err.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
