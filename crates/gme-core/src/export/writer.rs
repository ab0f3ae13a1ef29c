use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::{errors::Error, Result};

use super::ExportArtifact;

/// Writes rendered exports into a directory.
///
/// Bytes go to a hidden `.partial` file first and are renamed into place, so a
/// failed write never leaves a file under the final name.
#[derive(Clone, Debug)]
pub struct ExportWriter {
    dir: PathBuf,
}

impl ExportWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn write(&self, artifact: &ExportArtifact) -> Result<PathBuf> {
        let file_name = Path::new(&artifact.file_name)
            .file_name()
            .filter(|n| *n == artifact.file_name.as_str())
            .ok_or_else(|| {
                Error::ExportWrite(format!("invalid export file name: {}", artifact.file_name))
            })?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| write_error(&self.dir, e))?;

        let final_path = self.dir.join(file_name);
        let tmp_path = self.dir.join(format!(".{}.partial", artifact.file_name));

        if let Err(e) = tokio::fs::write(&tmp_path, &artifact.bytes).await {
            discard(&tmp_path).await;
            return Err(write_error(&tmp_path, e));
        }
        if let Err(e) = tokio::fs::rename(&tmp_path, &final_path).await {
            discard(&tmp_path).await;
            return Err(write_error(&final_path, e));
        }

        info!(
            path = %final_path.display(),
            format = %artifact.format,
            bytes = artifact.bytes.len(),
            "export written"
        );
        Ok(final_path)
    }
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "failed to remove partial export");
        }
    }
}

fn write_error(path: &Path, e: std::io::Error) -> Error {
    Error::ExportWrite(format!("{}: {e}", path.display()))
}
