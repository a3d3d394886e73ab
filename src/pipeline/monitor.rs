use std::{
    io::BufRead,
    path::{Path, PathBuf},
};

use ffmpeg_io::Frame;
use jpeg_encoder::{ColorType, Encoder};
use tokio_util::sync::CancellationToken;

/// Display and cancel hook, consulted once per fully written frame.
pub trait Monitor {
    /// Presents the latest comparison frame. Only called for interactive runs.
    fn show(&mut self, frame: &Frame) -> anyhow::Result<()>;

    /// Non-blocking check for a stop request.
    fn poll_cancel(&mut self) -> bool;
}

/// Headless runs: nothing is shown, cancellation comes from the token.
impl Monitor for CancellationToken {
    fn show(&mut self, _frame: &Frame) -> anyhow::Result<()> {
        Ok(())
    }

    fn poll_cancel(&mut self) -> bool {
        self.is_cancelled()
    }
}

/// Interactive runs: the latest comparison frame is kept as a JPEG on disk for an
/// image viewer with auto-reload.
pub struct JpegPreview {
    path: PathBuf,
    quality: u8,
    cancel: CancellationToken,
}

impl JpegPreview {
    pub fn new(path: impl Into<PathBuf>, quality: u8, cancel: CancellationToken) -> Self {
        Self {
            path: path.into(),
            quality,
            cancel,
        }
    }
}

impl Monitor for JpegPreview {
    fn show(&mut self, frame: &Frame) -> anyhow::Result<()> {
        write_jpeg(frame, &self.path, self.quality)
    }

    fn poll_cancel(&mut self) -> bool {
        self.cancel.is_cancelled()
    }
}

pub fn write_jpeg(frame: &Frame, path: &Path, quality: u8) -> anyhow::Result<()> {
    let width = u16::try_from(frame.width())
        .map_err(|_| anyhow::anyhow!("frame width {} exceeds jpeg limit", frame.width()))?;
    let height = u16::try_from(frame.height())
        .map_err(|_| anyhow::anyhow!("frame height {} exceeds jpeg limit", frame.height()))?;
    // Write next to the target and rename so viewers never see a torn file.
    let tmp = path.with_extension("jpg.tmp");
    let encoder = Encoder::new_file(&tmp, quality)?;
    encoder.encode(frame.data(), width, height, ColorType::Rgb)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Cancels `cancel` when a line reading `q` arrives on stdin. The reader thread is
/// detached; it ends with the process or at stdin EOF.
pub fn spawn_quit_listener(cancel: CancellationToken) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) if line.trim().eq_ignore_ascii_case("q") => {
                    log::info!("quit requested from keyboard");
                    cancel.cancel();
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    log::warn!("stdin closed: {}", e);
                    break;
                }
            }
        }
    });
}
