use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::Result;

const REQUEST_DIR_PREFIX: &str = "clipsage-";

/// Create a fresh temporary directory owned by a single request.
pub fn fresh_request_dir() -> Result<TempDir> {
    Ok(tempfile::Builder::new()
        .prefix(REQUEST_DIR_PREFIX)
        .tempdir()?)
}

/// Find the first file (by name) in `dir` whose extension matches `extension`.
pub fn find_file_with_extension(dir: &Path, extension: &str) -> Option<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return None;
    };

    let mut candidates: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension))
                .unwrap_or(false)
        })
        .collect();
    candidates.sort();
    candidates.into_iter().next()
}

/// Lowercased extension of a file name, if any.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

/// MIME type for the video containers we accept.
pub fn video_mime_type(path: &Path) -> &'static str {
    match extension_of(path).as_deref() {
        Some("mp4") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("avi") => "video/x-msvideo",
        Some("webm") => "video/webm",
        _ => "application/octet-stream",
    }
}

/// A local video owned by the current request.
///
/// The file lives inside a request-scoped temporary directory, which is
/// removed when this value is dropped.
#[derive(Debug)]
pub struct AcquiredVideo {
    dir: TempDir,
    path: PathBuf,
}

impl AcquiredVideo {
    pub fn new(dir: TempDir, path: PathBuf) -> Self {
        Self { dir, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    pub fn mime_type(&self) -> &'static str {
        video_mime_type(&self.path)
    }

    pub async fn size_bytes(&self) -> Result<u64> {
        Ok(tokio::fs::metadata(&self.path).await?.len())
    }

    /// Delete the video file and its directory. A missing file is not an error.
    pub async fn discard(self) {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => debug!(path = %self.path.display(), "removed acquired video"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove acquired video"),
        }

        if let Err(e) = self.dir.close() {
            warn!(error = %e, "failed to remove request directory");
        }
    }
}
