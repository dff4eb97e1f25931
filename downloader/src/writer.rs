use std::path::{Path, PathBuf};
use subgrab_core::CoreError;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    AlreadyExists,
}

/// Creates `<output_dir>/<target>` if needed and returns it.
pub async fn ensure_output_dir(output_dir: &Path, target: &str) -> Result<PathBuf, CoreError> {
    let dir = output_dir.join(target);
    fs::create_dir_all(&dir).await?;
    Ok(dir)
}

pub async fn file_exists(path: &Path) -> Result<bool, CoreError> {
    Ok(fs::try_exists(path).await?)
}

/// Writes `bytes` to `path` unless a file of that name already exists.
pub async fn write_image(path: &Path, bytes: &[u8]) -> Result<WriteOutcome, CoreError> {
    let mut file = match OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
    {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            debug!("{} already exists, not overwriting", path.display());
            return Ok(WriteOutcome::AlreadyExists);
        }
        Err(e) => return Err(e.into()),
    };

    if let Err(e) = write_all_synced(&mut file, bytes).await {
        // Don't leave a truncated image that would block later attempts
        drop(file);
        let _ = fs::remove_file(path).await;
        return Err(e.into());
    }
    Ok(WriteOutcome::Written)
}

async fn write_all_synced(file: &mut fs::File, bytes: &[u8]) -> std::io::Result<()> {
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_output_dir_created_on_demand() {
        let root = tempfile::tempdir().unwrap();
        let dir = ensure_output_dir(&root.path().join("output"), "x")
            .await
            .unwrap();

        assert!(dir.is_dir());
        assert!(dir.ends_with("output/x"));
        // Idempotent
        ensure_output_dir(&root.path().join("output"), "x")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_first_writer_wins() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("cat.jpg");

        assert_eq!(
            write_image(&path, b"first").await.unwrap(),
            WriteOutcome::Written
        );
        assert!(file_exists(&path).await.unwrap());
        assert_eq!(
            write_image(&path, b"second").await.unwrap(),
            WriteOutcome::AlreadyExists
        );
        assert_eq!(std::fs::read(&path).unwrap(), b"first");
    }

    #[tokio::test]
    async fn test_missing_directory_is_error() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("nope").join("cat.jpg");

        let err = write_image(&path, b"data").await.unwrap_err();
        assert!(matches!(err, CoreError::Io(_)));
        assert!(!file_exists(&path).await.unwrap());
    }
}
