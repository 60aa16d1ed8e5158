/// Audit logging for operations that touch the running ruleset
///
/// Every apply, restore, check and snapshot is appended to a JSON-lines log
/// in the state directory.
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Types of auditable events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ApplyRuleset,
    ReplaceRuleset,
    RestoreSnapshot,
    SaveSnapshot,
    CheckRuleset,
}

/// A single audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// When the event occurred (UTC)
    pub timestamp: chrono::DateTime<chrono::Utc>,

    pub event_type: EventType,

    pub success: bool,

    /// Additional structured data about the event
    pub details: serde_json::Value,

    /// Error message if operation failed
    pub error: Option<String>,
}

impl AuditEvent {
    pub fn new(
        event_type: EventType,
        success: bool,
        details: serde_json::Value,
        error: Option<String>,
    ) -> Self {
        Self {
            timestamp: chrono::Utc::now(),
            event_type,
            success,
            details,
            error,
        }
    }
}

/// Audit log writer
pub struct AuditLog {
    log_path: PathBuf,
}

impl AuditLog {
    /// Audit log in the state directory
    ///
    /// # Errors
    ///
    /// Returns `Err` if state directory cannot be determined
    pub fn new() -> std::io::Result<Self> {
        let mut log_path = crate::utils::get_state_dir().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "State directory not found")
        })?;
        log_path.push("audit.log");

        Ok(Self { log_path })
    }

    pub fn at(log_path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: log_path.into(),
        }
    }

    /// Appends an event as one JSON line.
    ///
    /// # Errors
    ///
    /// Returns `Err` if file cannot be opened or written
    pub async fn log(&self, event: AuditEvent) -> std::io::Result<()> {
        let json = serde_json::to_string(&event)?;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .await?;

        file.write_all(json.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.sync_all().await?;

        Ok(())
    }

    /// Reads the most recent events, newest first. Unparseable lines are
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns `Err` if file cannot be read
    pub async fn read_recent(&self, count: usize) -> std::io::Result<Vec<AuditEvent>> {
        let content = tokio::fs::read_to_string(&self.log_path).await?;

        let events: Vec<AuditEvent> = content
            .lines()
            .rev()
            .filter_map(|line| serde_json::from_str(line).ok())
            .take(count)
            .collect();

        Ok(events)
    }

    pub fn path(&self) -> &Path {
        &self.log_path
    }
}

async fn record(
    event_type: EventType,
    success: bool,
    details: serde_json::Value,
    error: Option<String>,
) {
    if let Ok(audit) = AuditLog::new() {
        let event = AuditEvent::new(event_type, success, details, error);
        if let Err(e) = audit.log(event).await {
            tracing::warn!("Failed to write audit log: {}", e);
        }
    }
}

/// Logs an apply (or replace) operation
pub async fn log_apply(
    replace: bool,
    rule_count: usize,
    checksum: &str,
    success: bool,
    error: Option<String>,
) {
    let event_type = if replace {
        EventType::ReplaceRuleset
    } else {
        EventType::ApplyRuleset
    };
    record(
        event_type,
        success,
        serde_json::json!({
            "rule_count": rule_count,
            "checksum": checksum,
        }),
        error,
    )
    .await;
}

/// Logs a snapshot restore
pub async fn log_restore(snapshot: &Path, success: bool, error: Option<String>) {
    record(
        EventType::RestoreSnapshot,
        success,
        serde_json::json!({ "snapshot": snapshot.display().to_string() }),
        error,
    )
    .await;
}

/// Logs a saved snapshot
pub async fn log_snapshot(snapshot: &Path, checksum: &str) {
    record(
        EventType::SaveSnapshot,
        true,
        serde_json::json!({
            "snapshot": snapshot.display().to_string(),
            "checksum": checksum,
        }),
        None,
    )
    .await;
}

/// Logs a verification operation
pub async fn log_check(success: bool, error_count: usize, error: Option<String>) {
    record(
        EventType::CheckRuleset,
        success,
        serde_json::json!({
            "error_count": error_count,
        }),
        error,
    )
    .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = AuditEvent::new(
            EventType::CheckRuleset,
            false,
            serde_json::json!({"error_count": 2}),
            Some("validation failed".to_string()),
        );

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("check_ruleset"));
        assert!(json.contains("validation failed"));
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"timestamp":"2024-01-01T00:00:00Z","event_type":"restore_snapshot","success":true,"details":{},"error":null}"#;
        let event: AuditEvent = serde_json::from_str(json).unwrap();

        assert!(event.success);
        assert_eq!(event.event_type, EventType::RestoreSnapshot);
    }

    #[tokio::test]
    async fn test_log_and_read_recent() {
        let dir = tempfile::tempdir().unwrap();
        let audit = AuditLog::at(dir.path().join("audit.log"));

        for (i, event_type) in [EventType::CheckRuleset, EventType::ApplyRuleset]
            .into_iter()
            .enumerate()
        {
            let event =
                AuditEvent::new(event_type, true, serde_json::json!({ "seq": i }), None);
            audit.log(event).await.unwrap();
        }

        let recent = audit.read_recent(1).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].event_type, EventType::ApplyRuleset);
        assert_eq!(recent[0].details["seq"], 1);
    }
}
