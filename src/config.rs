use std::{path::PathBuf, sync::LazyLock};

/// Process-wide defaults. Command-line flags override them per run.
pub struct SrConfig {
    fourcc: String,
    upscale_factor: u32,
    preview_path: PathBuf,
    progress_interval: u64,
    jpeg_quality: u8,
}

impl SrConfig {
    pub fn new(fourcc: &str, upscale_factor: u32, preview_path: &str) -> Self {
        Self {
            fourcc: fourcc.to_string(),
            upscale_factor,
            preview_path: PathBuf::from(preview_path),
            progress_interval: 25,
            jpeg_quality: 85,
        }
    }

    pub fn fourcc(&self) -> &str {
        &self.fourcc
    }

    pub fn upscale_factor(&self) -> u32 {
        self.upscale_factor
    }

    pub fn preview_path(&self) -> &PathBuf {
        &self.preview_path
    }

    /// Frames between two progress log lines.
    pub fn progress_interval(&self) -> u64 {
        self.progress_interval
    }

    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality
    }
}

pub fn config() -> &'static SrConfig {
    static CONFIG: LazyLock<SrConfig> = LazyLock::new(|| SrConfig::new("MPEG", 4, "preview.jpg"));
    &CONFIG
}
