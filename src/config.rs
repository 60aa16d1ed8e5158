use crate::core::nft_json::{MAX_SNAPSHOTS, NftBackend};
use crate::utils::get_data_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config.json";

/// Persistent settings of the command line tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// nft binary, overridden by `NFTKIT_NFT_COMMAND`
    #[serde(default)]
    pub nft_command: Option<String>,
    /// Privilege helper prefixed to nft when not running as root
    #[serde(default)]
    pub elevate_with: Option<String>,
    /// Export a snapshot of the running ruleset before every apply
    #[serde(default = "default_true")]
    pub snapshot_before_apply: bool,
    /// Snapshots kept in the state directory
    #[serde(default = "default_max_snapshots")]
    pub max_snapshots: usize,
    /// Verify with `nft --check` before applying
    #[serde(default = "default_true")]
    pub check_before_apply: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            nft_command: None,
            elevate_with: None,
            snapshot_before_apply: true,
            max_snapshots: MAX_SNAPSHOTS,
            check_before_apply: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_snapshots() -> usize {
    MAX_SNAPSHOTS
}

impl AppConfig {
    /// Backend for the configured nft command and privilege helper
    pub fn backend(&self) -> NftBackend {
        let backend = NftBackend::resolve(self.nft_command.as_deref());
        match &self.elevate_with {
            Some(helper) => backend.with_elevation(helper),
            None => backend,
        }
    }
}

/// Default location of the config file
pub fn config_path() -> Option<PathBuf> {
    get_data_dir().map(|dir| dir.join(CONFIG_FILE))
}

/// Saves the config to disk using an atomic write pattern.
/// 1. Writes to a temporary file.
/// 2. Sets restrictive permissions (0o600).
/// 3. Atomically renames to the target path.
pub async fn save_config_to(config: &AppConfig, path: &Path) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(config)?;
    let mut temp_path = path.as_os_str().to_owned();
    temp_path.push(".tmp");
    let temp_path = PathBuf::from(temp_path);

    // Permissions are set before any data is written
    #[cfg(unix)]
    {
        use tokio::fs::OpenOptions;
        use tokio::io::AsyncWriteExt;

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .mode(0o600)
            .open(&temp_path)
            .await?;

        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;
    }

    #[cfg(not(unix))]
    {
        use tokio::io::AsyncWriteExt;

        let mut file = tokio::fs::File::create(&temp_path).await?;
        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;
    }

    tokio::fs::rename(&temp_path, path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::StorageFull {
            std::io::Error::new(
                std::io::ErrorKind::StorageFull,
                "Disk full: cannot save configuration. Free up space and try again.",
            )
        } else {
            e
        }
    })
}

/// Saves the config into the data directory.
pub async fn save_config(config: &AppConfig) -> std::io::Result<()> {
    match config_path() {
        Some(path) => save_config_to(config, &path).await,
        None => Ok(()),
    }
}

/// Loads a config file, or returns the default if it is missing or unreadable.
pub async fn load_config_from(path: &Path) -> AppConfig {
    match tokio::fs::read_to_string(path).await {
        Ok(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
            tracing::warn!("Ignoring invalid config {}: {e}", path.display());
            AppConfig::default()
        }),
        Err(_) => AppConfig::default(),
    }
}

/// Loads the config from the data directory.
pub async fn load_config() -> AppConfig {
    match config_path() {
        Some(path) => load_config_from(&path).await,
        None => AppConfig::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let config = AppConfig {
            nft_command: Some("/usr/sbin/nft".to_string()),
            elevate_with: Some("sudo".to_string()),
            max_snapshots: 3,
            ..AppConfig::default()
        };

        save_config_to(&config, &path).await.unwrap();
        assert_eq!(load_config_from(&path).await, config);
        assert!(!dir.path().join("config.json.tmp").exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[tokio::test]
    async fn test_missing_file_gives_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("absent.json")).await;
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: AppConfig = serde_json::from_str(r#"{"nft_command": "nft"}"#).unwrap();
        assert!(config.snapshot_before_apply);
        assert!(config.check_before_apply);
        assert_eq!(config.max_snapshots, MAX_SNAPSHOTS);
    }

    #[test]
    fn test_backend_uses_elevation() {
        let _guard = crate::core::test_helpers::ENV_VAR_MUTEX.lock().unwrap();
        let config = AppConfig {
            elevate_with: Some("sudo".to_string()),
            ..AppConfig::default()
        };
        assert_eq!(
            config.backend(),
            NftBackend::resolve(None).with_elevation("sudo")
        );
    }
}
