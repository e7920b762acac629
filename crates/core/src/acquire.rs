use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

use crate::{
    error::{ClipsageError, Result},
    types::{SUPPORTED_VIDEO_EXTENSIONS, UploadedVideo},
    workspace::{AcquiredVideo, extension_of, find_file_with_extension, fresh_request_dir},
};

/// Container the downloader is asked for and the scan looks for afterwards.
pub const DOWNLOAD_EXTENSION: &str = "mp4";
const DOWNLOAD_TEMPLATE: &str = "video.%(ext)s";

/// Fetches a remote video into a directory following an output template.
#[async_trait]
pub trait VideoDownloader: Send + Sync {
    /// `output_template` uses the `%(ext)s` placeholder for the chosen extension.
    /// Errors carry the downloader's own explanation.
    async fn download(&self, url: &str, output_template: &Path) -> std::result::Result<(), String>;
}

/// Runs `yt-dlp` as a child process.
#[derive(Debug, Clone)]
pub struct YtDlpDownloader {
    program: String,
}

impl YtDlpDownloader {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for YtDlpDownloader {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

#[async_trait]
impl VideoDownloader for YtDlpDownloader {
    async fn download(&self, url: &str, output_template: &Path) -> std::result::Result<(), String> {
        // Options first; after `--` the URL can never be read as an option.
        let output = Command::new(&self.program)
            .arg("-f")
            .arg(format!("best[ext={}]", DOWNLOAD_EXTENSION))
            .arg("--no-playlist")
            .arg("--quiet")
            .arg("-o")
            .arg(output_template)
            .arg("--")
            .arg(url)
            .output()
            .await
            .map_err(|e| format!("could not run {}: {}", self.program, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(if stderr.is_empty() {
                format!("{} exited with {}", self.program, output.status)
            } else {
                stderr
            });
        }

        Ok(())
    }
}

/// Turns an upload or a YouTube link into a local video file.
#[derive(Clone)]
pub struct VideoAcquirer {
    downloader: Arc<dyn VideoDownloader>,
}

impl VideoAcquirer {
    pub fn new(downloader: Arc<dyn VideoDownloader>) -> Self {
        Self { downloader }
    }

    /// Write the uploaded bytes verbatim under the original file name.
    pub async fn acquire_upload(&self, upload: &UploadedVideo) -> Result<AcquiredVideo> {
        let file_name = upload_file_name(&upload.file_name)?;

        let dir = fresh_request_dir()?;
        let path = dir.path().join(&file_name);
        tokio::fs::write(&path, &upload.bytes)
            .await
            .map_err(|e| ClipsageError::VideoAcquisition {
                input: file_name.clone(),
                reason: e.to_string(),
            })?;

        info!(path = %path.display(), bytes = upload.bytes.len(), "stored uploaded video");
        Ok(AcquiredVideo::new(dir, path))
    }

    /// Download a YouTube video and return the produced mp4 file.
    pub async fn acquire_youtube(&self, url: &str) -> Result<AcquiredVideo> {
        let dir = fresh_request_dir()?;
        let template = dir.path().join(DOWNLOAD_TEMPLATE);

        self.downloader
            .download(url, &template)
            .await
            .map_err(|reason| download_failed(url, reason))?;

        let path: PathBuf = find_file_with_extension(dir.path(), DOWNLOAD_EXTENSION).ok_or_else(
            || download_failed(url, "Video download failed or format not found.".to_string()),
        )?;

        info!(url, path = %path.display(), "downloaded YouTube video");
        Ok(AcquiredVideo::new(dir, path))
    }
}

/// Final path component of an upload name, if it carries a supported extension.
pub fn upload_file_name(name: &str) -> Result<String> {
    let file_name = Path::new(name)
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ClipsageError::UnsupportedVideoFormat {
            file_name: name.to_string(),
        })?;

    let supported = extension_of(Path::new(&file_name))
        .map(|ext| SUPPORTED_VIDEO_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false);
    if !supported {
        return Err(ClipsageError::UnsupportedVideoFormat { file_name });
    }
    Ok(file_name)
}

fn download_failed(url: &str, reason: String) -> ClipsageError {
    ClipsageError::VideoAcquisition {
        input: url.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct WritingDownloader {
        file_name: &'static str,
    }

    #[async_trait]
    impl VideoDownloader for WritingDownloader {
        async fn download(
            &self,
            _url: &str,
            output_template: &Path,
        ) -> std::result::Result<(), String> {
            let dir = output_template.parent().unwrap();
            std::fs::write(dir.join(self.file_name), b"video").map_err(|e| e.to_string())
        }
    }

    struct FailingDownloader;

    #[async_trait]
    impl VideoDownloader for FailingDownloader {
        async fn download(&self, _url: &str, _template: &Path) -> std::result::Result<(), String> {
            Err("ERROR: [youtube] abc: Video unavailable".to_string())
        }
    }

    fn acquirer(downloader: impl VideoDownloader + 'static) -> VideoAcquirer {
        VideoAcquirer::new(Arc::new(downloader))
    }

    #[tokio::test]
    async fn upload_round_trips_bytes() {
        let bytes: Vec<u8> = (0u8..10).collect();
        let upload = UploadedVideo::new("clip.mp4", bytes.clone());

        let video = acquirer(FailingDownloader)
            .acquire_upload(&upload)
            .await
            .unwrap();

        assert_eq!(video.file_name(), "clip.mp4");
        assert_eq!(std::fs::read(video.path()).unwrap(), bytes);
        assert_eq!(video.size_bytes().await.unwrap(), 10);
    }

    #[tokio::test]
    async fn upload_uses_only_final_path_component() {
        let upload = UploadedVideo::new("../../escape/clip.mov", vec![1, 2, 3]);
        let video = acquirer(FailingDownloader)
            .acquire_upload(&upload)
            .await
            .unwrap();

        assert_eq!(video.path().parent().unwrap(), video.dir());
        assert_eq!(video.file_name(), "clip.mov");
    }

    #[tokio::test]
    async fn upload_rejects_unsupported_extension() {
        let upload = UploadedVideo::new("notes.txt", vec![1]);
        let err = acquirer(FailingDownloader)
            .acquire_upload(&upload)
            .await
            .unwrap_err();
        assert!(matches!(err, ClipsageError::UnsupportedVideoFormat { .. }));
    }

    #[tokio::test]
    async fn youtube_returns_downloaded_mp4() {
        let video = acquirer(WritingDownloader {
            file_name: "video.mp4",
        })
        .acquire_youtube("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
        .await
        .unwrap();

        assert_eq!(video.file_name(), "video.mp4");
        assert!(video.path().exists());
    }

    #[tokio::test]
    async fn youtube_without_matching_file_fails() {
        let err = acquirer(WritingDownloader {
            file_name: "video.webm",
        })
        .acquire_youtube("https://youtu.be/dQw4w9WgXcQ")
        .await
        .unwrap_err();

        match err {
            ClipsageError::VideoAcquisition { input, reason } => {
                assert_eq!(input, "https://youtu.be/dQw4w9WgXcQ");
                assert!(reason.contains("format not found"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn youtube_downloader_error_is_surfaced() {
        let err = acquirer(FailingDownloader)
            .acquire_youtube("https://youtu.be/abc")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ClipsageError::VideoAcquisition { ref reason, .. } if reason.contains("Video unavailable")
        ));
    }

    #[test]
    fn upload_names_are_checked_case_insensitively() {
        assert_eq!(upload_file_name("/tmp/Talk.MOV").unwrap(), "Talk.MOV");
        assert!(matches!(
            upload_file_name("archive.mp4.zip"),
            Err(ClipsageError::UnsupportedVideoFormat { .. })
        ));
        assert!(upload_file_name("..").is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn url_is_passed_after_option_terminator() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("echo-args.sh");
        std::fs::write(&script, "#!/bin/sh\nprintf '%s\\n' \"$@\" >&2\nexit 1\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let err = YtDlpDownloader::new(script.to_string_lossy())
            .download("--exec=touch /tmp/clipsage-exec", &dir.path().join("video.%(ext)s"))
            .await
            .unwrap_err();

        let args: Vec<&str> = err.lines().collect();
        let terminator = args.iter().position(|arg| *arg == "--").unwrap();
        assert_eq!(args[terminator + 1..], ["--exec=touch /tmp/clipsage-exec"]);
        assert_eq!(args[0], "-f");
    }

    #[tokio::test]
    async fn missing_downloader_binary_is_an_acquisition_error() {
        let err = acquirer(YtDlpDownloader::new("clipsage-no-such-downloader"))
            .acquire_youtube("https://youtu.be/abc")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ClipsageError::VideoAcquisition { ref reason, .. } if reason.contains("could not run")
        ));
    }
}
