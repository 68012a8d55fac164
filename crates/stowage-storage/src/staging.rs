//! Temp-file staging for streamed uploads.
//!
//! Incoming multipart streams are drained to a uniquely named file in the staging
//! directory, re-opened, and handed to the provider's stream path. The file is
//! removed when the [`StagedFile`] guard is released, on success and on failure.

use crate::keys;
use crate::traits::StorageResult;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use uuid::Uuid;

const COPY_BUF_SIZE: usize = 64 * 1024;

/// Owned temp file that is deleted when the guard goes away.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    removed: bool,
}

impl StagedFile {
    /// Create `{dir}/{uuid}{ext}`, creating `dir` if needed.
    pub async fn create(dir: &Path, filename: &str) -> StorageResult<(Self, File)> {
        tokio::fs::create_dir_all(dir).await?;

        let path = dir.join(format!("{}{}", Uuid::new_v4(), keys::extension(filename)));
        let file = File::create(&path).await?;

        tracing::debug!(path = %path.display(), "Created staging file");

        Ok((
            StagedFile {
                path,
                removed: false,
            },
            file,
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-open the staged file for reading from the start.
    pub async fn open(&self) -> StorageResult<File> {
        Ok(File::open(&self.path).await?)
    }

    /// Remove the file now. Missing files are not an error.
    pub async fn remove(mut self) {
        self.removed = true;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "Removed staging file");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    path = %self.path.display(),
                    "Failed to remove staging file"
                );
            }
        }
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    error = %e,
                    path = %self.path.display(),
                    "Failed to remove staging file on drop"
                );
            }
        }
    }
}

/// The incoming body could not be read (truncated or malformed upload).
#[derive(Debug, Error)]
#[error("Failed to read upload body: {0}")]
pub struct BodyReadError(#[source] pub std::io::Error);

/// Copy `reader` into `file`, calling `on_progress` with the running total after
/// every chunk. Returns the number of bytes written.
///
/// `on_progress` can abort the copy by returning an error. Read failures surface as
/// [`BodyReadError`], write failures as plain `io::Error`.
pub async fn drain_into<R, E, F>(
    reader: &mut R,
    file: &mut File,
    mut on_progress: F,
) -> Result<u64, E>
where
    R: AsyncRead + Unpin + ?Sized,
    E: From<std::io::Error> + From<BodyReadError>,
    F: FnMut(u64) -> Result<(), E>,
{
    let mut buf = vec![0u8; COPY_BUF_SIZE];
    let mut written = 0u64;

    loop {
        let n = reader.read(&mut buf).await.map_err(BodyReadError)?;
        if n == 0 {
            break;
        }
        written += n as u64;
        on_progress(written)?;
        file.write_all(&buf[..n]).await?;
    }

    file.flush().await?;
    file.sync_all().await?;

    Ok(written)
}
