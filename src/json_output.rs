//! JSON output for wrapping tools
//!
//! When --json-progress flag is enabled, all progress and status information
//! is emitted as JSON lines to stdout, suppressing all other output.

use serde::Serialize;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::{DepixelError, FailureKind};
use crate::image_processing::{BatchReport, ProcessingResult};

/// Last progress emission timestamp (milliseconds since epoch)
/// Used for throttling progress updates to ~25 FPS (40ms between updates)
static LAST_PROGRESS_MS: AtomicU64 = AtomicU64::new(0);

const PROGRESS_INTERVAL_MS: u64 = 40;

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JsonMessage {
    /// Progress update
    Progress {
        current: usize,
        total: usize,
        message: String,
    },
    /// File processing completed
    FileCompleted {
        input_path: String,
        output_paths: Vec<String>,
        shapes_kept: usize,
        shapes_removed: usize,
        processing_time_ms: u128,
    },
    /// File processing failed
    FileFailed {
        input_path: String,
        kind: FailureKind,
        error: String,
    },
    /// Processing summary
    Summary {
        total_files: usize,
        processed: usize,
        failed: usize,
        duration_secs: f64,
    },
}

impl JsonMessage {
    pub fn to_json(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }

    /// Emit JSON message to stdout
    pub fn emit(&self) {
        if let Some(json) = self.to_json() {
            println!("{}", json);
        }
    }

    /// Create and emit progress message (throttled to ~25 FPS)
    ///
    /// The final progress (current == total) is always emitted to ensure 100% completion.
    pub fn progress(current: usize, total: usize, message: impl Into<String>) {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        let last_ms = LAST_PROGRESS_MS.load(Ordering::Relaxed);

        if now_ms.saturating_sub(last_ms) >= PROGRESS_INTERVAL_MS || current == total {
            LAST_PROGRESS_MS.store(now_ms, Ordering::Relaxed);
            Self::Progress {
                current,
                total,
                message: message.into(),
            }
            .emit();
        }
    }

    pub fn completed(result: &ProcessingResult) -> Self {
        Self::FileCompleted {
            input_path: result.input_path.display().to_string(),
            output_paths: vec![
                result.vector_path.display().to_string(),
                result.preview_path.display().to_string(),
            ],
            shapes_kept: result.shapes_kept,
            shapes_removed: result.shapes_removed,
            processing_time_ms: result.processing_time.as_millis(),
        }
    }

    pub fn failed(input_path: &Path, error: &DepixelError) -> Self {
        Self::FileFailed {
            input_path: input_path.display().to_string(),
            kind: error.kind(),
            error: error.to_string(),
        }
    }

    pub fn summary(report: &BatchReport, duration: Duration) -> Self {
        let stats = report.stats();
        Self::Summary {
            total_files: stats.total_files,
            processed: stats.successful,
            failed: stats.failed,
            duration_secs: duration.as_secs_f64(),
        }
    }
}
