use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Serialize, Serializer};

use crate::pipeline::RunState;

/// Summary of a finished run, successful or cancelled.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub outcome: RunState,
    pub frames_processed: u64,
    /// Frame count reported by the source; may be an estimate.
    pub frame_count: u64,
    pub sr_size: (u32, u32),
    pub compare_size: (u32, u32),
    #[serde(rename = "transform_time_secs", serialize_with = "duration_secs")]
    pub transform_time_total: Duration,
    pub sr_path: PathBuf,
    pub compare_path: PathBuf,
}

impl RunReport {
    /// Mean inference time per processed frame.
    pub fn average_transform_time(&self) -> Duration {
        if self.frames_processed == 0 {
            return Duration::ZERO;
        }
        self.transform_time_total
            .div_f64(self.frames_processed as f64)
    }

    pub fn log_summary(&self) {
        log::info!(
            "{:?}: {} of {} frames, use time {:.2} s total, {:.1} ms per frame",
            self.outcome,
            self.frames_processed,
            self.frame_count,
            self.transform_time_total.as_secs_f64(),
            self.average_transform_time().as_secs_f64() * 1000.0
        );
        log::info!("upscaled video: {}", self.sr_path.display());
        log::info!("comparison video: {}", self.compare_path.display());
    }

    pub fn write_json(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .map_err(|e| anyhow::anyhow!("write report {}: {}", path.display(), e))
    }
}

fn duration_secs<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(value.as_secs_f64())
}
