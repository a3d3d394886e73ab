//! Frame-by-frame driver: decode, upscale, composite, encode twice.

pub mod controller;
pub mod media;
pub mod monitor;
pub mod transform;

use std::path::{Path, PathBuf};

use ffmpeg_io::VideoCodec;

pub use controller::{PipelineController, PipelineState, RunState};
pub use media::{FfmpegMedia, FrameSink, FrameSource, MediaOpener};
pub use monitor::{JpegPreview, Monitor, spawn_quit_listener};
pub use transform::{FrameTransform, ScaleTransform, Transformed};

/// Parameters of one comparison run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub source: PathBuf,
    pub upscale_factor: u32,
    pub interactive: bool,
    /// Directory for both outputs. Defaults to the current directory.
    pub output_dir: PathBuf,
    pub codec: VideoCodec,
    /// Frames between progress log lines; 0 disables them.
    pub progress_interval: u64,
}

impl RunConfig {
    pub fn new(source: impl Into<PathBuf>, upscale_factor: u32) -> Self {
        Self {
            source: source.into(),
            upscale_factor,
            interactive: false,
            output_dir: PathBuf::from("."),
            codec: VideoCodec::Mpeg4,
            progress_interval: 0,
        }
    }

    pub fn with_interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    pub fn with_codec(mut self, codec: VideoCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_progress_interval(mut self, frames: u64) -> Self {
        self.progress_interval = frames;
        self
    }

    /// `sr_<f>x_<basename>` in the output directory.
    pub fn sr_path(&self) -> PathBuf {
        self.output_path("sr")
    }

    /// `compare_<f>x_<basename>` in the output directory.
    pub fn compare_path(&self) -> PathBuf {
        self.output_path("compare")
    }

    fn output_path(&self, prefix: &str) -> PathBuf {
        let basename = file_name(&self.source);
        self.output_dir
            .join(format!("{}_{}x_{}", prefix, self.upscale_factor, basename))
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output.mp4".to_string())
}
