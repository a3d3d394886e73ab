use ffmpeg_io::{Filter, Frame, FrameScaler};

use super::{
    geometry::{OutputGeometry, STRIP_GAP, TILE_SIDE_PAD, TILE_TOP_PAD},
    ops::{Padding, five_crop, hconcat, pad, vconcat},
};
use crate::error::PipelineError;

const REFERENCE_PAD: Padding = Padding::new(0, 0, STRIP_GAP, STRIP_GAP);
const SR_PAD: Padding = Padding::new(STRIP_GAP, 0, 0, STRIP_GAP);
const REFERENCE_TILE_PAD: Padding = Padding::new(0, TILE_TOP_PAD, TILE_SIDE_PAD, 0);
const SR_TILE_PAD: Padding = Padding::new(TILE_SIDE_PAD, TILE_TOP_PAD, 0, 0);

/// Builds the side-by-side comparison frame for one source frame.
///
/// Layout, top to bottom:
/// - the source frame interpolated to the upscaled size, then the upscaled frame;
/// - five detail tiles (four corners and center) of each, reference tiles first,
///   rescaled to the width of the row above.
pub struct FrameCompositor {
    geometry: OutputGeometry,
    reference_scaler: FrameScaler,
    strip_scaler: FrameScaler,
}

impl FrameCompositor {
    pub fn new(geometry: OutputGeometry) -> anyhow::Result<Self> {
        let reference_scaler =
            FrameScaler::new(geometry.source_size, geometry.sr_size, Filter::Bicubic)?;
        let strip_scaler = FrameScaler::new(
            geometry.bottom_strip_size(),
            geometry.bottom_resized_size(),
            Filter::Bilinear,
        )?;
        Ok(Self {
            geometry,
            reference_scaler,
            strip_scaler,
        })
    }

    /// The source frame interpolated up to the upscaled size.
    pub fn reference(&mut self, source: &Frame) -> anyhow::Result<Frame> {
        self.reference_scaler.resize(source)
    }

    /// Composites `source` and its upscaled counterpart `sr`. `frame` only labels errors.
    pub fn compose(&mut self, frame: u64, source: &Frame, sr: &Frame) -> Result<Frame, PipelineError> {
        let g = self.geometry;
        check_size("compositor source input", g.source_size, source)?;
        check_size("compositor upscaled input", g.sr_size, sr)?;

        let compare = self
            .layout(source, sr)
            .map_err(|cause| PipelineError::Compose { frame, cause })?;
        check_size("comparison frame", g.compare_size, &compare)?;
        Ok(compare)
    }

    fn layout(&mut self, source: &Frame, sr: &Frame) -> anyhow::Result<Frame> {
        let reference = self.reference(source)?;
        let tile = self.geometry.crop_tile;

        let top = hconcat(&[pad(&reference, REFERENCE_PAD), pad(sr, SR_PAD)])?;

        let mut tiles = Vec::with_capacity(10);
        for crop in five_crop(&reference, tile)? {
            tiles.push(pad(&crop, REFERENCE_TILE_PAD));
        }
        for crop in five_crop(sr, tile)? {
            tiles.push(pad(&crop, SR_TILE_PAD));
        }
        let bottom = self.strip_scaler.resize(&hconcat(&tiles)?)?;

        vconcat(&[top, bottom])
    }
}

fn check_size(target: &'static str, expected: (u32, u32), frame: &Frame) -> Result<(), PipelineError> {
    if frame.size() != expected {
        return Err(PipelineError::Shape {
            target,
            expected,
            actual: frame.size(),
        });
    }
    Ok(())
}
