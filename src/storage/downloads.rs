use super::{write_atomic, StorageError, StorageResult};
use crate::fetch::MapArtifact;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Write an accepted map into the downloaded-maps directory
///
/// The artifact's file name is reduced to its last path component so a
/// hostile `Content-Disposition` cannot escape the directory.
pub async fn save_downloaded_map(dir: &Path, artifact: &MapArtifact) -> StorageResult<PathBuf> {
    let file_name = Path::new(&artifact.file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| StorageError::InvalidName(artifact.file_name.clone()))?;

    fs::create_dir_all(dir).await?;
    let path = dir.join(file_name);
    write_atomic(&path, &artifact.bytes).await?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_saves_under_plain_file_name() {
        let temp = TempDir::new().unwrap();
        let artifact = MapArtifact::new("../../evil.Challenge.Gbx", b"GBX".to_vec());

        let path = save_downloaded_map(temp.path(), &artifact).await.unwrap();
        assert_eq!(path, temp.path().join("evil.Challenge.Gbx"));
        assert_eq!(std::fs::read(&path).unwrap(), b"GBX");
    }

    #[tokio::test]
    async fn test_rejects_empty_name() {
        let temp = TempDir::new().unwrap();
        let artifact = MapArtifact::new("", Vec::new());
        assert!(matches!(
            save_downloaded_map(temp.path(), &artifact).await,
            Err(StorageError::InvalidName(_))
        ));
    }
}
