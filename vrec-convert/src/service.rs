//! Background conversion service.
//!
//! The upload handler of the surrounding system calls
//! [`ConversionService::convert`] exactly once per completed upload,
//! in a background task. Each conversion is single-threaded and owns
//! its framebuffer, timeline and encoder process, so concurrent calls
//! for different recordings need no coordination; bounding total
//! concurrency is the caller's policy.

use log::{error, info};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use crate::convert::{convert_data, ConversionSummary};
use crate::storage::{BlobStore, RecordingStatus, RecordingStore};

/// Converts uploaded captures and tracks their lifecycle
pub struct ConversionService {
    store: Arc<dyn RecordingStore>,
    blobs: Arc<dyn BlobStore>,
}

impl ConversionService {
    pub fn new(store: Arc<dyn RecordingStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { store, blobs }
    }

    /// Convert the capture blob of `id` into an MP4 blob.
    ///
    /// Marks the recording `processing`, runs the blocking pipeline
    /// off the async runtime, then records video path and completion
    /// time and marks it `ready`. Any fatal error, whether from the
    /// conversion itself or from storing the result, marks the
    /// recording `failed` and is returned; soft-degraded conversions
    /// still come out `ready`, possibly with a visually incomplete
    /// video.
    pub async fn convert(&self, id: &str) -> Result<ConversionSummary, String> {
        let meta = self
            .store
            .get(id)
            .ok_or_else(|| format!("Unknown recording: {}", id))?;

        self.store.update_status(id, RecordingStatus::Processing)?;
        info!("Converting recording {} ({})", id, meta.storage_path);

        let data = match self.blobs.get(&meta.storage_path) {
            Ok(data) => data,
            Err(e) => {
                self.store.update_status(id, RecordingStatus::Failed)?;
                return Err(e);
            }
        };

        let output = temp_output_path(id);
        let result = tokio::task::spawn_blocking(move || {
            let summary = convert_data(&data, &output).map_err(|e| e.to_string())?;
            let video = fs::read(&output).map_err(|e| format!("Failed to read video: {}", e));
            let _ = fs::remove_file(&output);
            Ok::<_, String>((summary, video?))
        })
        .await
        .map_err(|e| format!("Conversion task panicked: {}", e))?;

        match result {
            Ok((summary, video)) => match self.publish(id, &meta.storage_path, &video) {
                Ok(video_path) => {
                    info!(
                        "Recording {} ready: {} ({} frames)",
                        id, video_path, summary.frames
                    );
                    Ok(summary)
                }
                Err(e) => {
                    error!("Publishing video for {} failed: {}", id, e);
                    self.store.update_status(id, RecordingStatus::Failed)?;
                    Err(e)
                }
            },
            Err(e) => {
                error!("Conversion of {} failed: {}", id, e);
                self.store.update_status(id, RecordingStatus::Failed)?;
                Err(e)
            }
        }
    }

    /// Store the finished video and flip the recording to `ready`
    fn publish(&self, id: &str, storage_path: &str, video: &[u8]) -> Result<String, String> {
        let video_path = video_path_for(storage_path);
        self.blobs.save(&video_path, video)?;
        self.store.update_video_path(id, &video_path)?;
        self.store
            .update_completion(id, chrono::Utc::now().timestamp_millis() as u64)?;
        self.store.update_status(id, RecordingStatus::Ready)?;
        Ok(video_path)
    }
}

/// Video blob path derived from the capture's storage path
fn video_path_for(storage_path: &str) -> String {
    format!("{}.mp4", storage_path.trim_end_matches(".vrec"))
}

fn temp_output_path(id: &str) -> PathBuf {
    std::env::temp_dir().join(format!("vrec-{}-{}.mp4", id, std::process::id()))
}
