//! Startup migration from the legacy flat-file layout (one
//! `<session_id>.json` file per session, with snapshots interleaved into
//! the same document) into the current
//! `<root>/<session_id>/{history.jsonl,checkpoints.json,snapshots/*.json,mode.json}`
//! layout.
//!
//! Grounded on the teacher's migration-on-startup pattern in
//! `llama-agent::storage` (scan the storage root, detect an outdated shape,
//! rewrite it), using the same write-temp-and-rename primitives as the rest
//! of persistence so a migration that crashes mid-run leaves no partial
//! session directory behind.

use crate::fsutil::atomic_write;
use crate::types::{CheckpointRecord, Message, ModeState, Session, Snapshot};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Legacy on-disk shape: everything for one session in a single JSON file.
#[derive(Debug, Deserialize)]
struct LegacySessionFile {
    session_id: String,
    model_id: String,
    window_tokens: usize,
    created_at: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    messages: Vec<Message>,
    #[serde(default)]
    checkpoint_records: Vec<CheckpointRecord>,
    #[serde(default)]
    snapshots: Vec<Snapshot>,
    #[serde(default)]
    mode_state: Option<ModeState>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub migrated: Vec<String>,
    pub skipped: Vec<String>,
    pub dry_run: bool,
}

/// Scans `storage_root` for legacy `<session_id>.json` files and rewrites
/// each into the current per-session directory layout. Already-migrated
/// sessions (a directory with the same name already exists) are skipped,
/// which is what makes running the migration twice a no-op. In `dry_run`
/// mode nothing is written; the report lists what would have migrated.
pub async fn migrate(storage_root: &Path, dry_run: bool) -> std::io::Result<MigrationReport> {
    let mut report = MigrationReport { migrated: Vec::new(), skipped: Vec::new(), dry_run };

    if !storage_root.exists() {
        return Ok(report);
    }

    let mut entries = tokio::fs::read_dir(storage_root).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        let session_dir = storage_root.join(stem);
        if session_dir.exists() {
            report.skipped.push(stem.to_string());
            continue;
        }

        let content = tokio::fs::read(&path).await?;
        let legacy: LegacySessionFile = match serde_json::from_slice(&content) {
            Ok(legacy) => legacy,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "not a legacy session file; skipping");
                report.skipped.push(stem.to_string());
                continue;
            }
        };

        if dry_run {
            info!(session_id = %legacy.session_id, "would migrate legacy session file");
            report.migrated.push(legacy.session_id);
            continue;
        }

        migrate_one(storage_root, &legacy).await?;
        info!(session_id = %legacy.session_id, "migrated legacy session file");
        report.migrated.push(legacy.session_id);
    }

    Ok(report)
}

fn json_err(e: serde_json::Error) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, e)
}

async fn migrate_one(storage_root: &Path, legacy: &LegacySessionFile) -> std::io::Result<()> {
    let session_id = legacy
        .session_id
        .parse()
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidData, "legacy session_id is not a valid ulid"))?;
    let session = Session {
        session_id,
        model_id: legacy.model_id.clone(),
        window_tokens: legacy.window_tokens,
        created_at: legacy.created_at,
        root_dir: storage_root.join(&legacy.session_id),
    };

    let mut history_lines = Vec::with_capacity(legacy.messages.len());
    for message in &legacy.messages {
        history_lines.push(serde_json::to_string(message).map_err(json_err)?);
    }
    let history_body = if history_lines.is_empty() { String::new() } else { format!("{}\n", history_lines.join("\n")) };
    atomic_write(&session.history_path(), history_body.as_bytes()).await?;

    let checkpoints_json = serde_json::to_vec_pretty(&legacy.checkpoint_records).map_err(json_err)?;
    atomic_write(&session.checkpoints_path(), &checkpoints_json).await?;

    if let Some(mode_state) = &legacy.mode_state {
        let mode_json = serde_json::to_vec_pretty(mode_state).map_err(json_err)?;
        atomic_write(&session.mode_path(), &mode_json).await?;
    }

    for snapshot in &legacy.snapshots {
        let path: PathBuf = session.snapshots_dir().join(format!("{}.json", snapshot.id));
        let json = serde_json::to_vec_pretty(snapshot).map_err(json_err)?;
        atomic_write(&path, &json).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use ulid::Ulid;

    fn legacy_json(session_id: &str) -> serde_json::Value {
        serde_json::json!({
            "session_id": session_id,
            "model_id": "model-a",
            "window_tokens": 4096,
            "created_at": chrono::Utc::now().to_rfc3339(),
            "messages": [
                { "id": Ulid::new().to_string(), "role": "user", "content": "hi", "token_count": 1, "timestamp": chrono::Utc::now().to_rfc3339() }
            ],
            "checkpoint_records": [],
            "snapshots": [],
            "mode_state": null,
        })
    }

    #[tokio::test]
    async fn migrates_a_legacy_file_into_the_current_layout() {
        let dir = TempDir::new().unwrap();
        let session_id = Ulid::new().to_string();
        let legacy_path = dir.path().join(format!("{session_id}.json"));
        tokio::fs::write(&legacy_path, serde_json::to_vec(&legacy_json(&session_id)).unwrap())
            .await
            .unwrap();

        let report = migrate(dir.path(), false).await.unwrap();
        assert_eq!(report.migrated, vec![session_id.clone()]);

        let session_dir = dir.path().join(&session_id);
        assert!(session_dir.join("history.jsonl").exists());
        assert!(session_dir.join("checkpoints.json").exists());

        let history = tokio::fs::read_to_string(session_dir.join("history.jsonl")).await.unwrap();
        assert!(history.contains("\"hi\""));
    }

    #[tokio::test]
    async fn running_migration_twice_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let session_id = Ulid::new().to_string();
        let legacy_path = dir.path().join(format!("{session_id}.json"));
        tokio::fs::write(&legacy_path, serde_json::to_vec(&legacy_json(&session_id)).unwrap())
            .await
            .unwrap();

        let first = migrate(dir.path(), false).await.unwrap();
        let second = migrate(dir.path(), false).await.unwrap();

        assert_eq!(first.migrated.len(), 1);
        assert_eq!(second.migrated.len(), 0);
        assert_eq!(second.skipped.len(), 1);
    }

    #[tokio::test]
    async fn dry_run_reports_without_writing() {
        let dir = TempDir::new().unwrap();
        let session_id = Ulid::new().to_string();
        let legacy_path = dir.path().join(format!("{session_id}.json"));
        tokio::fs::write(&legacy_path, serde_json::to_vec(&legacy_json(&session_id)).unwrap())
            .await
            .unwrap();

        let report = migrate(dir.path(), true).await.unwrap();
        assert_eq!(report.migrated.len(), 1);
        assert!(!dir.path().join(&session_id).exists());
    }
}
