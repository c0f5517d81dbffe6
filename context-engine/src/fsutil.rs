//! Atomic file write helper shared by history, checkpoint, snapshot, and
//! mode persistence. Grounded on the teacher's write-temp/fsync/rename
//! pattern in its session storage.

use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Writes `contents` to `path` atomically: a `.tmp` sibling is created,
/// written, fsync'd, then renamed over the destination. A crash between the
/// temp-file write and the rename leaves the destination untouched and the
/// `.tmp` file orphaned; callers that scan a directory on startup should
/// remove stray `.tmp` files (see `migration::remove_partial_files`).
pub async fn atomic_write(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let temp_path = path.with_extension(format!(
        "{}.tmp",
        path.extension().and_then(|e| e.to_str()).unwrap_or("")
    ));

    let mut file = fs::File::create(&temp_path).await?;
    file.write_all(contents).await?;
    file.sync_all().await?;
    drop(file);

    fs::rename(&temp_path, path).await?;
    Ok(())
}

/// Appends a single line to a file, creating it if absent. Used for
/// `history.jsonl`, which must be durable per-message rather than
/// rewritten wholesale on every append.
pub async fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_bytes()).await?;
    file.write_all(b"\n").await?;
    file.sync_all().await?;
    Ok(())
}

/// Removes any `*.tmp` files left behind by an interrupted `atomic_write`
/// under `dir` (non-recursive). Called on startup per snapshot directory.
pub async fn remove_stray_temp_files(dir: &Path) -> std::io::Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }
    let mut removed = 0;
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("tmp") {
            fs::remove_file(&path).await?;
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn atomic_write_produces_final_file_without_temp_leftover() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        atomic_write(&path, b"{}").await.unwrap();
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "{}");
        assert_eq!(remove_stray_temp_files(dir.path()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn remove_stray_temp_files_cleans_partial_writes() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(dir.path().join("orphan.tmp"), b"partial").await.unwrap();
        let removed = remove_stray_temp_files(dir.path()).await.unwrap();
        assert_eq!(removed, 1);
        assert!(!dir.path().join("orphan.tmp").exists());
    }

    #[tokio::test]
    async fn append_line_preserves_prior_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.jsonl");
        append_line(&path, "one").await.unwrap();
        append_line(&path, "two").await.unwrap();
        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(content, "one\ntwo\n");
    }
}
