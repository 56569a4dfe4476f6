//! Staging of uploaded answers.
//!
//! The uploaded audio lives in a named temp file for exactly one request. The
//! file is removed by [`AudioArtifact::remove`] on the normal path and by
//! `NamedTempFile`'s `Drop` on any other.

use std::path::Path;

use coach_core::AnalysisError;
use tempfile::NamedTempFile;

/// Assumed when neither the client nor content sniffing names a type.
pub const DEFAULT_AUDIO_MIME: &str = "audio/webm";

#[derive(Debug)]
pub struct AudioArtifact {
    file: NamedTempFile,
    mime_type: String,
}

impl AudioArtifact {
    /// Write `bytes` to a fresh `temp_*` file under `dir`.
    pub async fn stage(
        dir: &Path,
        original_name: &str,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> Result<Self, AnalysisError> {
        tokio::fs::create_dir_all(dir).await?;

        let file = tempfile::Builder::new()
            .prefix("temp_")
            .suffix(&format!("_{}", safe_file_name(original_name)))
            .tempfile_in(dir)?;
        tokio::fs::write(file.path(), bytes).await?;

        let mime_type = resolve_mime(content_type, bytes);
        tracing::debug!(path = %file.path().display(), mime = %mime_type, "Staged uploaded audio");

        Ok(Self { file, mime_type })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Delete the staged file now, logging instead of failing.
    pub fn remove(self) {
        let path = self.file.path().to_path_buf();
        match self.file.close() {
            Ok(()) => tracing::debug!(path = %path.display(), "Cleaned up temp file"),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to remove temp file"),
        }
    }
}

/// The client's content type unless it is missing or generic, then a sniffed
/// type, then [`DEFAULT_AUDIO_MIME`].
pub fn resolve_mime(content_type: Option<&str>, bytes: &[u8]) -> String {
    let declared = content_type
        .map(|ct| ct.split(';').next().unwrap_or(ct).trim())
        .filter(|ct| !ct.is_empty() && *ct != "application/octet-stream");

    if let Some(ct) = declared {
        return ct.to_string();
    }

    infer::get(bytes)
        .map(|kind| kind.mime_type().to_string())
        .unwrap_or_else(|| DEFAULT_AUDIO_MIME.to_string())
}

/// Last path component with anything outside `[A-Za-z0-9._-]` replaced.
fn safe_file_name(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
        .collect();
    if cleaned.trim_matches('.').is_empty() {
        "answer".to_string()
    } else {
        cleaned
    }
}
