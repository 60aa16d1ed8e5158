//! Process boundary to the `nft` binary
//!
//! [`NftBackend`] pipes wire JSON into `nft --json -f -` and reads
//! `nft --json list ruleset` back. Snapshots of exported rulesets are kept in
//! the XDG state directory, each next to a `.sha256` sidecar.

use crate::core::decode::decode;
use crate::core::encode::encode_value;
use crate::core::error::{Error, Result, SnapshotError};
use crate::core::ruleset::Ruleset;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{error, info, warn};

/// Overrides the nft command for every backend built from configuration
pub const NFT_COMMAND_ENV: &str = "NFTKIT_NFT_COMMAND";

pub const DEFAULT_NFT_COMMAND: &str = "nft";

/// Snapshots kept by [`save_snapshot`] unless configured otherwise
pub const MAX_SNAPSHOTS: usize = 5;

const SNAPSHOT_PREFIX: &str = "snapshot_";
const SNAPSHOT_SUFFIX: &str = ".json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NftBackend {
    program: PathBuf,
    /// Privilege helper (`sudo`, `run0`, ...) used when not running as root
    elevate_with: Option<String>,
}

impl Default for NftBackend {
    fn default() -> Self {
        Self::new(DEFAULT_NFT_COMMAND)
    }
}

impl NftBackend {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            elevate_with: None,
        }
    }

    /// `NFTKIT_NFT_COMMAND` if set, then `configured`, then plain `nft`.
    pub fn resolve(configured: Option<&str>) -> Self {
        let from_env = std::env::var(NFT_COMMAND_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty());
        match from_env.as_deref().or(configured) {
            Some(program) => Self::new(program),
            None => Self::default(),
        }
    }

    pub fn with_elevation(mut self, helper: impl Into<String>) -> Self {
        self.elevate_with = Some(helper.into());
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = match &self.elevate_with {
            Some(helper) if !nix::unistd::getuid().is_root() => {
                let mut cmd = Command::new(helper);
                cmd.arg(&self.program);
                cmd
            }
            _ => Command::new(&self.program),
        };
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Runs nft, feeding `input` on stdin. A non-zero exit is returned as
    /// output, not as an error.
    pub(crate) async fn run(&self, args: &[&str], input: Option<&[u8]>) -> Result<Output> {
        let mut child = self.command(args).spawn().map_err(|e| {
            error!("Failed to spawn {}: {e}", self.program.display());
            Error::Nftables {
                message: format!("Failed to spawn {}: {e}", self.program.display()),
                stderr: None,
                exit_code: None,
            }
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            if let Some(input) = input {
                stdin.write_all(input).await?;
            }
            stdin.shutdown().await?;
        }

        Ok(child.wait_with_output().await?)
    }

    async fn run_checked(&self, what: &str, args: &[&str], input: Option<&[u8]>) -> Result<Vec<u8>> {
        let output = self.run(args, input).await?;
        if output.status.success() {
            info!("{what} successful");
            Ok(output.stdout)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            error!("{what} failed: {stderr}");
            let message = stderr
                .lines()
                .next()
                .unwrap_or("nft exited with an error")
                .to_string();
            Err(Error::Nftables {
                message,
                stderr: Some(stderr),
                exit_code: output.status.code(),
            })
        }
    }

    /// Adds every entity of `ruleset` to the running ruleset.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the ruleset does not encode, nft cannot be spawned or
    /// nft rejects the batch.
    pub async fn apply(&self, ruleset: &Ruleset) -> Result<()> {
        let payload = serde_json::to_vec(&encode_value(ruleset)?)?;
        info!(
            "Applying ruleset ({} tables, {} rules, sha256 {})",
            ruleset.tables.len(),
            ruleset.rules.len(),
            ruleset.checksum()?
        );
        self.run_checked("Apply", &["--json", "-f", "-"], Some(&payload))
            .await
            .map(drop)
    }

    /// Replaces the running ruleset with `ruleset` in one transaction.
    ///
    /// # Errors
    ///
    /// See [`NftBackend::apply`].
    pub async fn replace(&self, ruleset: &Ruleset) -> Result<()> {
        let payload = serde_json::to_vec(&flush_then(encode_value(ruleset)?))?;
        info!(
            "Replacing ruleset ({} tables, {} rules)",
            ruleset.tables.len(),
            ruleset.rules.len()
        );
        self.run_checked("Replace", &["--json", "-f", "-"], Some(&payload))
            .await
            .map(drop)
    }

    /// Returns `nft --json list ruleset` output.
    ///
    /// # Errors
    ///
    /// Returns `Err` if nft cannot be spawned or fails.
    pub async fn export(&self) -> Result<Vec<u8>> {
        info!("Exporting ruleset");
        self.run_checked("Export", &["--json", "list", "ruleset"], None)
            .await
    }

    /// Replaces the running ruleset with a previously exported one.
    ///
    /// The snapshot must decode as a ruleset; nothing is sent to nft
    /// otherwise. Its nodes go to nft as stored, after a flush.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the snapshot is malformed or nft rejects it.
    pub async fn restore(&self, snapshot: &[u8]) -> Result<()> {
        let ruleset = validate_snapshot(snapshot)?;
        info!(
            "Snapshot validation passed, restoring {} tables and {} rules",
            ruleset.tables.len(),
            ruleset.rules.len()
        );
        let stored: Value = serde_json::from_slice(snapshot)?;
        let payload = serde_json::to_vec(&flush_then(stored))?;
        self.run_checked("Restore", &["--json", "-f", "-"], Some(&payload))
            .await
            .map(drop)
    }
}

/// Prefixes a `{"nftables": [...]}` batch with a ruleset flush. A bare node
/// array is wrapped first.
fn flush_then(payload: Value) -> Value {
    let mut payload = match payload {
        Value::Array(nodes) => serde_json::json!({ "nftables": nodes }),
        other => other,
    };
    if let Some(nodes) = payload
        .get_mut("nftables")
        .and_then(Value::as_array_mut)
    {
        nodes.insert(0, serde_json::json!({ "flush": { "ruleset": null } }));
    }
    payload
}

/// Checks that a snapshot is a decodable ruleset.
///
/// An empty ruleset is accepted, restoring it clears the firewall.
fn validate_snapshot(snapshot: &[u8]) -> Result<Ruleset> {
    let ruleset = decode(snapshot)
        .map_err(|e| SnapshotError::Corrupted(format!("not a valid ruleset: {e}")))?;
    if ruleset.is_empty() {
        warn!("Snapshot contains an empty ruleset, restoring it clears the firewall");
    }
    Ok(ruleset)
}

/// SHA-256 of raw bytes, lowercase hex
pub fn compute_checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn sidecar_path(snapshot: &Path) -> PathBuf {
    let mut name = snapshot.as_os_str().to_owned();
    name.push(".sha256");
    PathBuf::from(name)
}

/// Writes `contents` to `path` through a temp file in the same directory.
fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| Error::Internal(format!("{} has no parent directory", path.display())))?;
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

/// Saves an exported ruleset into `dir` and prunes all but the newest `keep`.
pub fn save_snapshot(dir: &Path, snapshot: &[u8], keep: usize) -> Result<PathBuf> {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S_%3f");
    let path = dir.join(format!("{SNAPSHOT_PREFIX}{timestamp}{SNAPSHOT_SUFFIX}"));

    write_atomic(&path, snapshot)?;
    write_atomic(&sidecar_path(&path), compute_checksum(snapshot).as_bytes())?;
    info!("Snapshot saved to {}", path.display());

    prune_snapshots(dir, keep)?;
    Ok(path)
}

/// Snapshots in `dir`, newest first
pub fn list_snapshots(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut snapshots: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(SNAPSHOT_PREFIX) && n.ends_with(SNAPSHOT_SUFFIX))
        })
        .collect();

    // Timestamped names sort chronologically
    snapshots.sort_unstable_by(|a, b| b.cmp(a));
    Ok(snapshots)
}

/// Removes all but the newest `keep` snapshots.
pub fn prune_snapshots(dir: &Path, keep: usize) -> Result<()> {
    let mut snapshots = list_snapshots(dir)?;
    if snapshots.len() <= keep {
        return Ok(());
    }
    for snapshot in snapshots.drain(keep..) {
        if let Err(e) = std::fs::remove_file(&snapshot) {
            warn!("Failed to remove old snapshot {}: {e}", snapshot.display());
            continue;
        }
        let _ = std::fs::remove_file(sidecar_path(&snapshot));
        info!("Removed old snapshot: {}", snapshot.display());
    }
    Ok(())
}

/// Reads a snapshot, checking it against its sidecar when one exists.
pub fn load_snapshot(path: &Path) -> Result<Vec<u8>> {
    let bytes = std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::Snapshot(SnapshotError::NotFound(path.display().to_string()))
        } else {
            Error::Io(e)
        }
    })?;

    match std::fs::read_to_string(sidecar_path(path)) {
        Ok(expected) => {
            let expected = expected.trim().to_string();
            let actual = compute_checksum(&bytes);
            if expected != actual {
                return Err(SnapshotError::ChecksumMismatch { expected, actual }.into());
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("Snapshot {} has no checksum sidecar", path.display());
        }
        Err(e) => return Err(e.into()),
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TABLE_ONLY: &[u8] = br#"{"nftables":[{"table":{"family":"inet","name":"t","handle":1}}]}"#;

    #[test]
    fn test_validate_snapshot_valid() {
        let ruleset = validate_snapshot(TABLE_ONLY).unwrap();
        assert_eq!(ruleset.tables.len(), 1);
    }

    #[test]
    fn test_validate_snapshot_missing_nftables() {
        let err = validate_snapshot(br#"{"something_else": []}"#).unwrap_err();
        assert!(matches!(err, Error::Snapshot(SnapshotError::Corrupted(_))));
    }

    #[test]
    fn test_validate_snapshot_empty_is_ok() {
        assert!(validate_snapshot(br#"{"nftables": []}"#).is_ok());
    }

    #[test]
    fn test_validate_snapshot_rejects_bad_tokens() {
        let bad = br#"{"nftables":[{"table":{"family":"ipx","name":"t"}}]}"#;
        assert!(validate_snapshot(bad).is_err());
    }

    #[test]
    fn test_flush_is_prepended() {
        let payload = flush_then(json!({"nftables": [{"table": {"family": "ip", "name": "t"}}]}));
        assert_eq!(payload["nftables"][0], json!({"flush": {"ruleset": null}}));
        assert_eq!(payload["nftables"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_flush_wraps_bare_node_array() {
        let payload = flush_then(json!([{"table": {"family": "ip", "name": "t"}}]));
        assert_eq!(
            payload,
            json!({"nftables": [
                {"flush": {"ruleset": null}},
                {"table": {"family": "ip", "name": "t"}}
            ]})
        );
    }

    #[test]
    fn test_compute_checksum_deterministic() {
        let checksum1 = compute_checksum(TABLE_ONLY);
        let checksum2 = compute_checksum(TABLE_ONLY);
        assert_eq!(checksum1, checksum2);
        assert_eq!(checksum1.len(), 64);
        assert_ne!(checksum1, compute_checksum(b"{}"));
    }

    #[test]
    fn test_snapshot_save_list_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_snapshot(dir.path(), TABLE_ONLY, MAX_SNAPSHOTS).unwrap();
        assert!(sidecar_path(&path).exists());
        assert_eq!(list_snapshots(dir.path()).unwrap(), vec![path.clone()]);
        assert_eq!(load_snapshot(&path).unwrap(), TABLE_ONLY);
    }

    #[test]
    fn test_tampered_snapshot_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_snapshot(dir.path(), TABLE_ONLY, MAX_SNAPSHOTS).unwrap();
        std::fs::write(&path, br#"{"nftables":[]}"#).unwrap();
        assert!(matches!(
            load_snapshot(&path),
            Err(Error::Snapshot(SnapshotError::ChecksumMismatch { .. }))
        ));
    }

    #[test]
    fn test_missing_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_snapshot(&dir.path().join("snapshot_none.json")),
            Err(Error::Snapshot(SnapshotError::NotFound(_)))
        ));
    }

    #[test]
    fn test_prune_keeps_newest() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..4 {
            let path = dir.path().join(format!("snapshot_2024010{i}_000000_000.json"));
            std::fs::write(&path, TABLE_ONLY).unwrap();
            std::fs::write(sidecar_path(&path), compute_checksum(TABLE_ONLY)).unwrap();
        }
        prune_snapshots(dir.path(), 2).unwrap();
        let names: Vec<String> = list_snapshots(dir.path())
            .unwrap()
            .iter()
            .filter_map(|p| p.file_name()?.to_str().map(String::from))
            .collect();
        assert_eq!(
            names,
            [
                "snapshot_20240103_000000_000.json",
                "snapshot_20240102_000000_000.json"
            ]
        );
        assert!(!sidecar_path(&dir.path().join("snapshot_20240100_000000_000.json")).exists());
    }

    #[test]
    fn test_resolve_order() {
        let _guard = crate::core::test_helpers::ENV_VAR_MUTEX.lock().unwrap();
        // SAFETY: env access is serialized by ENV_VAR_MUTEX
        unsafe {
            std::env::remove_var(NFT_COMMAND_ENV);
        }
        assert_eq!(NftBackend::resolve(None).program(), Path::new("nft"));
        assert_eq!(
            NftBackend::resolve(Some("/usr/sbin/nft")).program(),
            Path::new("/usr/sbin/nft")
        );

        unsafe {
            std::env::set_var(NFT_COMMAND_ENV, "/opt/nft/bin/nft");
        }
        assert_eq!(
            NftBackend::resolve(Some("/usr/sbin/nft")).program(),
            Path::new("/opt/nft/bin/nft")
        );
        unsafe {
            std::env::remove_var(NFT_COMMAND_ENV);
        }
    }
}
