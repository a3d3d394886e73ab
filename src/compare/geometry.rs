use ffmpeg_io::VideoStream;
use serde::Serialize;

use crate::error::PipelineError;

/// Gap between the two halves of the top strip: 5 px right of the reference plus
/// 5 px left of the upscaled frame.
pub const SEPARATOR: u32 = 10;
/// Padding under each half of the top strip.
pub const STRIP_GAP: u32 = 5;
/// Horizontal padding around each detail tile.
pub const TILE_SIDE_PAD: u32 = 10;
/// Padding above each detail tile.
pub const TILE_TOP_PAD: u32 = 5;
pub const TILES_PER_SIDE: u32 = 5;

/// Output sizes derived once per run from the source size and upscale factor.
/// Sizes are `(width, height)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OutputGeometry {
    pub source_size: (u32, u32),
    pub upscale_factor: u32,
    pub sr_size: (u32, u32),
    pub crop_tile: u32,
    pub compare_size: (u32, u32),
}

impl OutputGeometry {
    pub fn derive(stream: &VideoStream, upscale_factor: u32) -> Result<Self, PipelineError> {
        Self::from_size(stream.size(), upscale_factor)
    }

    pub fn from_size(source_size: (u32, u32), upscale_factor: u32) -> Result<Self, PipelineError> {
        let (width, height) = source_size;
        if upscale_factor == 0 {
            return Err(PipelineError::stream_open("upscale factor must be positive"));
        }
        if width == 0 || height == 0 {
            return Err(PipelineError::stream_open(format!(
                "invalid source size {}x{}",
                width, height
            )));
        }
        let sr_size = match (width.checked_mul(upscale_factor), height.checked_mul(upscale_factor)) {
            (Some(w), Some(h)) => (w, h),
            _ => {
                return Err(PipelineError::stream_open(format!(
                    "{}x{} upscaled by {} overflows",
                    width, height, upscale_factor
                )));
            }
        };

        let crop_tile = i64::from(sr_size.0 / 5) - 9;
        if crop_tile <= 0 {
            return Err(PipelineError::stream_open(format!(
                "upscaled width {} is too small for detail tiles (tile size {})",
                sr_size.0, crop_tile
            )));
        }
        let crop_tile = crop_tile as u32;
        if crop_tile > sr_size.1 {
            return Err(PipelineError::stream_open(format!(
                "detail tile {} does not fit upscaled height {}",
                crop_tile, sr_size.1
            )));
        }

        let compare_size = (
            sr_size.0 * 2 + SEPARATOR,
            sr_size.1 + SEPARATOR + crop_tile,
        );
        Ok(Self {
            source_size,
            upscale_factor,
            sr_size,
            crop_tile,
            compare_size,
        })
    }

    /// Reference and upscaled frames side by side, each padded by 5 px.
    pub fn top_strip_size(&self) -> (u32, u32) {
        (self.sr_size.0 * 2 + SEPARATOR, self.sr_size.1 + STRIP_GAP)
    }

    /// Ten padded detail tiles in a row, before rescaling.
    pub fn bottom_strip_size(&self) -> (u32, u32) {
        (
            2 * TILES_PER_SIDE * (self.crop_tile + TILE_SIDE_PAD),
            self.crop_tile + TILE_TOP_PAD,
        )
    }

    /// Bottom strip rescaled to the top strip's width; height scales by the same
    /// ratio and is truncated.
    pub fn bottom_resized_size(&self) -> (u32, u32) {
        let (top_w, _) = self.top_strip_size();
        let (strip_w, strip_h) = self.bottom_strip_size();
        let height = u64::from(top_w) * u64::from(strip_h) / u64::from(strip_w);
        (top_w, height as u32)
    }
}
