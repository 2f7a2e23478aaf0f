use std::path::Path;

use anyhow::{Context, Result};
use tempfile::NamedTempFile;
use tracing::warn;

/// One uploaded resume spooled to temporary storage.
///
/// The temp file is owned by this value and removed when it is dropped, so an
/// upload can never outlive the request that created it.
#[derive(Debug)]
pub struct UploadedDocument {
    file_name: String,
    content_type: Option<String>,
    file: NamedTempFile,
}

impl UploadedDocument {
    /// Writes `bytes` to a fresh temp file inside `dir`.
    pub async fn spool(
        dir: &Path,
        file_name: &str,
        content_type: Option<String>,
        bytes: &[u8],
    ) -> Result<Self> {
        let file = tempfile::Builder::new()
            .prefix("resume-")
            .tempfile_in(dir)
            .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
        tokio::fs::write(file.path(), bytes)
            .await
            .with_context(|| format!("Failed to spool upload {file_name}"))?;

        Ok(Self {
            file_name: display_name(file_name),
            content_type,
            file,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub async fn read_bytes(&self) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(self.file.path()).await
    }

    /// Deletes the temp file now and reports a failed delete.
    pub fn discard(self) {
        let name = self.file_name;
        if let Err(e) = self.file.close() {
            warn!("Failed to delete temp upload for {name}: {e}");
        }
    }
}

/// Client-supplied names may carry directories; keep the last component only.
fn display_name(raw: &str) -> String {
    raw.rsplit(|c| c == '/' || c == '\\')
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or("upload")
        .to_string()
}
