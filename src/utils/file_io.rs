use std::fs::create_dir_all;
use std::path::Path;
use std::time::SystemTime;

use tokio::io::AsyncWriteExt;
use tracing::debug;
use tracing::error;

use crate::Result;
use crate::StorageError;

fn path_error(
    path: &Path,
    source: std::io::Error,
) -> StorageError {
    StorageError::PathError {
        path: path.to_path_buf(),
        source,
    }
}

pub(crate) fn create_parent_dir_if_not_exist(path: &Path) -> Result<()> {
    if let Some(parent_dir) = path.parent() {
        if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
            if let Err(e) = create_dir_all(parent_dir) {
                error!("Failed to create directory {:?}: {:?}", parent_dir, e);
                return Err(path_error(parent_dir, e).into());
            }
        }
    }
    Ok(())
}

/// `None` when the file does not exist.
pub(crate) async fn read_optional(path: &Path) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(path_error(path, e).into()),
    }
}

/// Replaces `path` with `contents` via a sibling temp file and rename.
pub(crate) async fn write_atomically(
    path: &Path,
    contents: &[u8],
) -> Result<()> {
    create_parent_dir_if_not_exist(path)?;
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = Path::new(&tmp_name);

    let mut file = tokio::fs::File::create(tmp_path)
        .await
        .map_err(|e| path_error(tmp_path, e))?;
    file.write_all(contents).await.map_err(|e| path_error(tmp_path, e))?;
    file.sync_all().await.map_err(|e| path_error(tmp_path, e))?;
    drop(file);

    tokio::fs::rename(tmp_path, path)
        .await
        .map_err(|e| path_error(path, e))?;
    debug!("rewrote {:?} ({} bytes)", path, contents.len());
    Ok(())
}

/// Creates `path` only if it does not exist yet. Returns whether it was created.
pub(crate) async fn create_new(
    path: &Path,
    contents: &[u8],
) -> Result<bool> {
    create_parent_dir_if_not_exist(path)?;
    let opened = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await;
    let mut file = match opened {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(path_error(path, e).into()),
    };
    file.write_all(contents).await.map_err(|e| path_error(path, e))?;
    file.sync_all().await.map_err(|e| path_error(path, e))?;
    Ok(true)
}

/// Size and modification time, `None` when missing.
pub(crate) async fn file_stat(path: &Path) -> Result<Option<(u64, SystemTime)>> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => {
            let modified = meta.modified().map_err(|e| path_error(path, e))?;
            Ok(Some((meta.len(), modified)))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(path_error(path, e).into()),
    }
}
