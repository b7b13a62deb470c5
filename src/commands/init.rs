//! Init command implementation

use crate::config::Config;
use crate::error::{Error, Result};
use crate::store::NewsStore;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone)]
pub struct InitOptions {
    pub base_dir: PathBuf,
    pub config_path: PathBuf,
    pub force: bool,
}

/// Where the configuration and database ended up
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitReport {
    pub config_file: PathBuf,
    pub db_file: PathBuf,
    pub overwritten: bool,
}

/// Write a default configuration and create the database schema
pub async fn cmd_init(options: InitOptions) -> Result<InitReport> {
    let InitOptions {
        base_dir,
        config_path,
        force,
    } = options;

    let overwritten = config_path.exists();
    if overwritten && !force {
        return Err(Error::Config(format!(
            "Config already exists at {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    let mut config = Config::default();
    config.init_paths(Some(base_dir));
    config.paths.config_file = config_path;
    config.validate()?;
    config.save()?;

    let store = NewsStore::connect(&config).await?;
    store.init_schema().await?;
    info!("Created database at {:?}", config.paths.db_file);

    Ok(InitReport {
        config_file: config.paths.config_file,
        db_file: config.paths.db_file,
        overwritten,
    })
}

/// Print the init summary
pub fn print_init(report: &InitReport) {
    println!("✓ Initialized storyline");
    println!("\nConfiguration: {}", report.config_file.display());
    println!("Database: {}", report.db_file.display());
    println!("\nNext steps:");
    println!("  storyline import articles.jsonl   # Queue ingested articles");
    println!("  storyline run                     # Cluster, check history, sweep");
    println!("  storyline run --watch             # Keep running on the schedule");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn options(tmp: &TempDir, force: bool) -> InitOptions {
        InitOptions {
            base_dir: tmp.path().to_path_buf(),
            config_path: tmp.path().join("config.toml"),
            force,
        }
    }

    #[tokio::test]
    async fn test_init_creates_config_and_schema() {
        let tmp = TempDir::new().unwrap();
        let report = cmd_init(options(&tmp, false)).await.unwrap();
        assert!(!report.overwritten);
        assert!(report.config_file.exists());
        assert!(report.db_file.exists());

        let config = Config::load(&report.config_file).unwrap();
        assert_eq!(config.clustering.similarity_threshold, 0.70);

        let store = NewsStore::open(&report.db_file).await.unwrap();
        assert!(store.is_initialized().await.unwrap());
    }

    #[tokio::test]
    async fn test_init_refuses_to_overwrite_without_force() {
        let tmp = TempDir::new().unwrap();
        cmd_init(options(&tmp, false)).await.unwrap();

        let err = cmd_init(options(&tmp, false)).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let report = cmd_init(options(&tmp, true)).await.unwrap();
        assert!(report.overwritten);
    }
}
