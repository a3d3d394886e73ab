use std::time::{Duration, Instant};

use ffmpeg_io::{Filter, Frame, FrameScaler};

/// Output of one transform call.
#[derive(Debug)]
pub struct Transformed {
    pub frame: Frame,
    pub elapsed: Duration,
}

/// A super-resolution model bound to its weights and device, run in inference
/// mode. Implementations must be deterministic for a given input and must not keep
/// the input past the call.
pub trait FrameTransform {
    /// Linear ratio between output and input frame sizes.
    fn upscale_factor(&self) -> u32;

    fn infer(&mut self, frame: &Frame) -> anyhow::Result<Frame>;

    /// Runs [`FrameTransform::infer`] and measures it.
    fn transform(&mut self, frame: &Frame) -> anyhow::Result<Transformed> {
        let start = Instant::now();
        let frame = self.infer(frame)?;
        Ok(Transformed {
            frame,
            elapsed: start.elapsed(),
        })
    }
}

/// Interpolating upscaler. Serves as the baseline model and lets the pipeline run
/// end to end without network weights.
pub struct ScaleTransform {
    factor: u32,
    filter: Filter,
    scaler: Option<FrameScaler>,
}

impl ScaleTransform {
    pub fn new(factor: u32, filter: Filter) -> Self {
        Self {
            factor,
            filter,
            scaler: None,
        }
    }
}

impl FrameTransform for ScaleTransform {
    fn upscale_factor(&self) -> u32 {
        self.factor
    }

    fn infer(&mut self, frame: &Frame) -> anyhow::Result<Frame> {
        let src = frame.size();
        let reusable = self.scaler.as_ref().is_some_and(|s| s.src_size() == src);
        if !reusable {
            let dst = src
                .0
                .checked_mul(self.factor)
                .zip(src.1.checked_mul(self.factor))
                .ok_or_else(|| anyhow::anyhow!("{:?} upscaled by {} overflows", src, self.factor))?;
            log::debug!("building {:?} scaler {:?} -> {:?}", self.filter, src, dst);
            self.scaler = Some(FrameScaler::new(src, dst, self.filter)?);
        }
        match self.scaler.as_mut() {
            Some(scaler) => scaler.resize(frame),
            None => Err(anyhow::anyhow!("scaler not initialized")),
        }
    }
}
