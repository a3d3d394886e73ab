//! Four-character-code to encoder mapping for [`crate::VideoSink`].

use std::fmt;
use std::str::FromStr;

use ffmpeg_next::format::Pixel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    /// MPEG-4 Part 2, ffmpeg's built-in `mpeg4` encoder.
    Mpeg4,
    Mjpeg,
    H264,
    /// Single still images, used for the evaluation output.
    Bmp,
}

impl VideoCodec {
    /// Resolves a fourcc such as `MPEG` or `avc1`. Short codes are space padded,
    /// matching is case-insensitive.
    pub fn from_fourcc(fourcc: &str) -> anyhow::Result<Self> {
        if fourcc.is_empty() || fourcc.len() > 4 || !fourcc.is_ascii() {
            anyhow::bail!("invalid fourcc {:?}", fourcc);
        }
        let code = format!("{:<4}", fourcc.to_ascii_uppercase());
        match code.as_str() {
            "MPEG" | "MP4V" | "XVID" | "DIVX" | "FMP4" => Ok(VideoCodec::Mpeg4),
            "MJPG" => Ok(VideoCodec::Mjpeg),
            "H264" | "AVC1" | "X264" => Ok(VideoCodec::H264),
            "BMP " => Ok(VideoCodec::Bmp),
            _ => Err(anyhow::anyhow!("unsupported fourcc {:?}", fourcc)),
        }
    }

    pub fn encoder_name(&self) -> &'static str {
        match self {
            VideoCodec::Mpeg4 => "mpeg4",
            VideoCodec::Mjpeg => "mjpeg",
            VideoCodec::H264 => "libx264",
            VideoCodec::Bmp => "bmp",
        }
    }

    /// libx264 rejects odd widths and heights for 4:2:0 input.
    pub fn requires_even_size(&self) -> bool {
        matches!(self, VideoCodec::H264)
    }

    pub fn pixel_format(&self) -> Pixel {
        match self {
            VideoCodec::Mpeg4 | VideoCodec::H264 => Pixel::YUV420P,
            VideoCodec::Mjpeg => Pixel::YUVJ420P,
            VideoCodec::Bmp => Pixel::BGR24,
        }
    }
}

impl FromStr for VideoCodec {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_fourcc(s)
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.encoder_name())
    }
}
