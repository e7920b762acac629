use std::{path::Path, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    error::{ClipsageError, Result},
    provider::{GeminiClient, ensure_success},
    types::{AssetState, RemoteAsset},
    workspace::extension_of,
};

/// Remote service that accepts video files and reports their processing state.
#[async_trait]
pub trait MediaService: Send + Sync {
    async fn upload(&self, path: &Path, mime_type: &str) -> Result<RemoteAsset>;
    async fn get(&self, name: &str) -> Result<RemoteAsset>;
}

#[derive(Serialize)]
struct FileMetadata<'a> {
    display_name: &'a str,
}

#[derive(Serialize)]
struct StartUploadRequest<'a> {
    file: FileMetadata<'a>,
}

#[derive(Deserialize)]
struct UploadResponse {
    file: RemoteAsset,
}

#[async_trait]
impl MediaService for GeminiClient {
    async fn upload(&self, path: &Path, mime_type: &str) -> Result<RemoteAsset> {
        let api_key = self.api_key()?;
        let bytes = tokio::fs::read(path).await?;
        let display_name = format!(
            "upload-{}.{}",
            Uuid::new_v4(),
            extension_of(path).unwrap_or_else(|| "bin".to_string())
        );

        let start = self
            .http()
            .post(self.url("upload/v1beta/files"))
            .header("x-goog-api-key", api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", bytes.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&StartUploadRequest {
                file: FileMetadata {
                    display_name: &display_name,
                },
            })
            .send()
            .await?;
        let start = ensure_success(start).await?;

        let upload_url = start
            .headers()
            .get("x-goog-upload-url")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| ClipsageError::InvalidApiResponse {
                reason: "upload start response is missing x-goog-upload-url".to_string(),
            })?;

        let size = bytes.len();
        let finished = self
            .http()
            .post(upload_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes)
            .send()
            .await?;
        let finished = ensure_success(finished).await?;

        let uploaded: UploadResponse = finished.json().await?;
        info!(
            name = %uploaded.file.name,
            display_name = %display_name,
            bytes = size,
            state = ?uploaded.file.state,
            "uploaded video"
        );
        Ok(uploaded.file)
    }

    async fn get(&self, name: &str) -> Result<RemoteAsset> {
        let response = self
            .http()
            .get(self.url(&format!("v1beta/{}", name)))
            .header("x-goog-api-key", self.api_key()?)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        Ok(response.json::<RemoteAsset>().await?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    Fixed,
    Exponential { factor: f64, max_interval: Duration },
}

impl Backoff {
    pub fn next(&self, current: Duration) -> Duration {
        match *self {
            Backoff::Fixed => current,
            Backoff::Exponential {
                factor,
                max_interval,
            } => Duration::try_from_secs_f64(current.as_secs_f64() * factor.max(1.0))
                .map_or(max_interval, |next| next.min(max_interval)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: 300,
            backoff: Backoff::Fixed,
        }
    }
}

/// Where an asset stands in the readiness state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Pending,
    Ready,
    Failed,
}

impl From<AssetState> for Readiness {
    fn from(state: AssetState) -> Self {
        match state {
            AssetState::Processing | AssetState::Unspecified => Readiness::Pending,
            AssetState::Ready => Readiness::Ready,
            AssetState::Failed => Readiness::Failed,
        }
    }
}

/// Uploads a video and waits, within a bounded budget, until it is usable.
#[derive(Debug, Clone, Default)]
pub struct ReadinessPoller {
    policy: PollPolicy,
}

impl ReadinessPoller {
    pub fn new(policy: PollPolicy) -> Self {
        Self { policy }
    }

    pub async fn upload_and_wait(
        &self,
        service: &dyn MediaService,
        path: &Path,
        mime_type: &str,
    ) -> Result<RemoteAsset> {
        let asset = service.upload(path, mime_type).await?;
        self.wait_until_ready(service, asset).await
    }

    /// Poll `asset` until it is ready, failed, or the attempt budget is spent.
    pub async fn wait_until_ready(
        &self,
        service: &dyn MediaService,
        mut asset: RemoteAsset,
    ) -> Result<RemoteAsset> {
        let mut attempts = 0u32;
        let mut delay = self.policy.interval;

        loop {
            match Readiness::from(asset.state) {
                Readiness::Ready => {
                    info!(name = %asset.name, attempts, "remote asset ready");
                    return Ok(asset);
                }
                Readiness::Failed => {
                    warn!(name = %asset.name, attempts, "remote processing failed");
                    return Err(ClipsageError::AssetFailed { name: asset.name });
                }
                Readiness::Pending => {}
            }

            if attempts >= self.policy.max_attempts {
                warn!(name = %asset.name, attempts, "gave up waiting for remote asset");
                return Err(ClipsageError::AssetTimedOut {
                    name: asset.name,
                    attempts,
                });
            }

            tokio::time::sleep(delay).await;
            attempts += 1;
            asset = service.get(&asset.name).await?;
            debug!(name = %asset.name, attempt = attempts, state = ?asset.state, "polled remote asset");
            delay = self.policy.backoff.next(delay);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicU32, Ordering},
    };

    use tokio::time::Instant;

    use super::*;

    struct ScriptedService {
        upload_state: AssetState,
        states: Mutex<Vec<AssetState>>,
        gets: AtomicU32,
    }

    impl ScriptedService {
        fn new(upload_state: AssetState, mut states: Vec<AssetState>) -> Self {
            states.reverse();
            Self {
                upload_state,
                states: Mutex::new(states),
                gets: AtomicU32::new(0),
            }
        }

        fn asset(state: AssetState) -> RemoteAsset {
            RemoteAsset {
                name: "files/abc".to_string(),
                display_name: None,
                mime_type: "video/mp4".to_string(),
                uri: "https://example.test/files/abc".to_string(),
                state,
            }
        }
    }

    #[async_trait]
    impl MediaService for ScriptedService {
        async fn upload(&self, _path: &Path, _mime_type: &str) -> Result<RemoteAsset> {
            Ok(Self::asset(self.upload_state))
        }

        async fn get(&self, name: &str) -> Result<RemoteAsset> {
            assert_eq!(name, "files/abc");
            self.gets.fetch_add(1, Ordering::SeqCst);
            let state = self
                .states
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(AssetState::Processing);
            Ok(Self::asset(state))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn two_processing_states_take_two_cycles() {
        let service = ScriptedService::new(
            AssetState::Processing,
            vec![AssetState::Processing, AssetState::Ready],
        );
        let started = Instant::now();

        let asset = ReadinessPoller::default()
            .upload_and_wait(&service, Path::new("video.mp4"), "video/mp4")
            .await
            .unwrap();

        assert_eq!(asset.state, AssetState::Ready);
        assert_eq!(service.gets.load(Ordering::SeqCst), 2);
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn ready_at_upload_skips_polling() {
        let service = ScriptedService::new(AssetState::Ready, vec![]);
        let started = Instant::now();

        ReadinessPoller::default()
            .upload_and_wait(&service, Path::new("video.mp4"), "video/mp4")
            .await
            .unwrap();

        assert_eq!(service.gets.load(Ordering::SeqCst), 0);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_state_is_reported() {
        let service = ScriptedService::new(AssetState::Processing, vec![AssetState::Failed]);

        let err = ReadinessPoller::default()
            .upload_and_wait(&service, Path::new("video.mp4"), "video/mp4")
            .await
            .unwrap_err();

        assert!(matches!(err, ClipsageError::AssetFailed { ref name } if name == "files/abc"));
        assert_eq!(service.gets.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_asset_times_out_after_budget() {
        let service = ScriptedService::new(AssetState::Processing, vec![]);
        let poller = ReadinessPoller::new(PollPolicy {
            interval: Duration::from_secs(1),
            max_attempts: 5,
            backoff: Backoff::Fixed,
        });
        let started = Instant::now();

        let err = poller
            .upload_and_wait(&service, Path::new("video.mp4"), "video/mp4")
            .await
            .unwrap_err();

        assert!(matches!(err, ClipsageError::AssetTimedOut { attempts: 5, .. }));
        assert_eq!(service.gets.load(Ordering::SeqCst), 5);
        assert_eq!(started.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn exponential_backoff_grows_until_cap() {
        let service = ScriptedService::new(
            AssetState::Processing,
            vec![
                AssetState::Processing,
                AssetState::Processing,
                AssetState::Processing,
                AssetState::Ready,
            ],
        );
        let poller = ReadinessPoller::new(PollPolicy {
            interval: Duration::from_secs(1),
            max_attempts: 10,
            backoff: Backoff::Exponential {
                factor: 2.0,
                max_interval: Duration::from_secs(3),
            },
        });
        let started = Instant::now();

        poller
            .upload_and_wait(&service, Path::new("video.mp4"), "video/mp4")
            .await
            .unwrap();

        // 1 + 2 + 3 + 3
        assert_eq!(started.elapsed(), Duration::from_secs(9));
    }

    #[test]
    fn exponential_backoff_saturates_at_cap() {
        let backoff = Backoff::Exponential {
            factor: 2.0,
            max_interval: Duration::from_secs(30),
        };
        assert_eq!(backoff.next(Duration::MAX), Duration::from_secs(30));
        assert_eq!(backoff.next(Duration::from_secs(4)), Duration::from_secs(8));
        assert_eq!(Backoff::Fixed.next(Duration::MAX), Duration::MAX);
    }

    #[test]
    fn readiness_follows_asset_state() {
        assert_eq!(Readiness::from(AssetState::Processing), Readiness::Pending);
        assert_eq!(Readiness::from(AssetState::Unspecified), Readiness::Pending);
        assert_eq!(Readiness::from(AssetState::Ready), Readiness::Ready);
        assert_eq!(Readiness::from(AssetState::Failed), Readiness::Failed);
    }
}
