use std::str::FromStr;

use ffmpeg_next::{
    format::Pixel,
    software::scaling::{Context, Flags},
};

use crate::frame::Frame;

/// Interpolation used by swscale when the size changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    Point,
    Bilinear,
    Bicubic,
    Lanczos,
}

impl Filter {
    fn flags(self) -> Flags {
        // Accurate rounding keeps output independent of the SIMD path taken.
        let base = match self {
            Filter::Point => Flags::POINT,
            Filter::Bilinear => Flags::BILINEAR,
            Filter::Bicubic => Flags::BICUBIC,
            Filter::Lanczos => Flags::LANCZOS,
        };
        base | Flags::ACCURATE_RND | Flags::BITEXACT
    }
}

impl FromStr for Filter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "point" | "nearest" => Ok(Filter::Point),
            "bilinear" => Ok(Filter::Bilinear),
            "bicubic" => Ok(Filter::Bicubic),
            "lanczos" => Ok(Filter::Lanczos),
            other => Err(anyhow::anyhow!("unknown filter: {}", other)),
        }
    }
}

pub struct Scaler {
    context: Context,
}

impl Scaler {
    pub fn new(
        src: (Pixel, u32, u32),
        dst: (Pixel, u32, u32),
        filter: Filter,
    ) -> anyhow::Result<Self> {
        let context = Context::get(src.0, src.1, src.2, dst.0, dst.1, dst.2, filter.flags())?;
        Ok(Self { context })
    }

    pub fn run(
        &mut self,
        frame: &ffmpeg_next::frame::Video,
        dst: &mut ffmpeg_next::frame::Video,
    ) -> anyhow::Result<()> {
        self.context.run(frame, dst).map_err(|e| e.into())
    }
}

unsafe impl Send for Scaler {}

/// Resizes packed RGB frames of one fixed size to another fixed size.
pub struct FrameScaler {
    scaler: Scaler,
    src: (u32, u32),
    dst: (u32, u32),
}

impl FrameScaler {
    pub fn new(src: (u32, u32), dst: (u32, u32), filter: Filter) -> anyhow::Result<Self> {
        if src.0 == 0 || src.1 == 0 || dst.0 == 0 || dst.1 == 0 {
            anyhow::bail!("cannot scale {:?} to {:?}", src, dst);
        }
        let scaler = Scaler::new(
            (Pixel::RGB24, src.0, src.1),
            (Pixel::RGB24, dst.0, dst.1),
            filter,
        )?;
        Ok(Self { scaler, src, dst })
    }

    pub fn src_size(&self) -> (u32, u32) {
        self.src
    }

    pub fn resize(&mut self, frame: &Frame) -> anyhow::Result<Frame> {
        if frame.size() != self.src {
            anyhow::bail!(
                "scaler built for {:?}, got frame of {:?}",
                self.src,
                frame.size()
            );
        }
        let input = frame.to_video();
        let mut output = ffmpeg_next::frame::Video::empty();
        self.scaler.run(&input, &mut output)?;
        let resized = Frame::from_video(&output)?;
        if resized.size() != self.dst {
            anyhow::bail!("scaler produced {:?}, expected {:?}", resized.size(), self.dst);
        }
        Ok(resized)
    }
}
