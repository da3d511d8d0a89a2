use std::path::{Path, PathBuf};

/// Runtime configuration resolved from CLI arguments and environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root data directory; the store and catalog live under `processed/`.
    pub data_dir: PathBuf,
    /// CORS origin allow-list. Empty means permissive.
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn new(data_dir: impl AsRef<Path>, cors_origins: Vec<String>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            cors_origins,
        }
    }

    /// Read the CORS allow-list from `CEASTATS_CORS_ORIGINS` (comma-separated).
    pub fn cors_origins_from_env() -> Vec<String> {
        std::env::var("CEASTATS_CORS_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.data_dir.join("processed")
    }

    pub fn db_path(&self) -> PathBuf {
        self.processed_dir().join("cea-transactions.db")
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.processed_dir().join("datasets.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_derive_from_data_dir() {
        let config = Config::new("/var/data", vec![]);
        assert_eq!(
            config.db_path(),
            PathBuf::from("/var/data/processed/cea-transactions.db")
        );
        assert_eq!(
            config.catalog_path(),
            PathBuf::from("/var/data/processed/datasets.json")
        );
    }
}
