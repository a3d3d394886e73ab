use std::fmt::{Debug, Formatter};

use ffmpeg_next::format::Pixel;

/// Bytes per pixel of a packed RGB24 frame.
pub const CHANNELS: usize = 3;

/// A dense, packed RGB24 picture. Rows are `width * 3` bytes with no padding.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> anyhow::Result<Self> {
        if width == 0 || height == 0 {
            anyhow::bail!("invalid frame size {}x{}", width, height);
        }
        let expected = width as usize * height as usize * CHANNELS;
        if data.len() != expected {
            anyhow::bail!(
                "frame buffer holds {} bytes, {}x{} rgb24 needs {}",
                data.len(),
                width,
                height,
                expected
            );
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A frame of one solid color. Zero-sized frames are not representable, so both
    /// dimensions are clamped to at least one pixel.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let (width, height) = (width.max(1), height.max(1));
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * CHANNELS)
            .collect();
        Self {
            width,
            height,
            data,
        }
    }

    pub fn black(width: u32, height: u32) -> Self {
        Self::filled(width, height, [0, 0, 0])
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Row length in bytes.
    pub fn stride(&self) -> usize {
        self.width as usize * CHANNELS
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn row(&self, y: u32) -> &[u8] {
        let stride = self.stride();
        let start = y as usize * stride;
        &self.data[start..start + stride]
    }

    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let stride = self.stride();
        let start = y as usize * stride;
        &mut self.data[start..start + stride]
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let i = y as usize * self.stride() + x as usize * CHANNELS;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    /// Copies an RGB24 ffmpeg frame, dropping the per-row alignment padding.
    pub fn from_video(frame: &ffmpeg_next::frame::Video) -> anyhow::Result<Self> {
        if frame.format() != Pixel::RGB24 {
            anyhow::bail!("expected rgb24 frame, got {:?}", frame.format());
        }
        let (width, height) = (frame.width(), frame.height());
        let row_len = width as usize * CHANNELS;
        let linesize = frame.stride(0);
        let src = frame.data(0);
        let mut data = Vec::with_capacity(row_len * height as usize);
        for y in 0..height as usize {
            let start = y * linesize;
            data.extend_from_slice(&src[start..start + row_len]);
        }
        Self::new(width, height, data)
    }

    /// Allocates an RGB24 ffmpeg frame holding a copy of this picture.
    pub fn to_video(&self) -> ffmpeg_next::frame::Video {
        let mut video = ffmpeg_next::frame::Video::new(Pixel::RGB24, self.width, self.height);
        let linesize = video.stride(0);
        let row_len = self.stride();
        let dst = video.data_mut(0);
        for (y, row) in self.data.chunks_exact(row_len).enumerate() {
            let start = y * linesize;
            dst[start..start + row_len].copy_from_slice(row);
        }
        video
    }
}

impl Debug for Frame {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(
            f,
            "Frame {{ width: {}, height: {}, data_len: {} }}",
            self.width,
            self.height,
            self.data.len()
        )
    }
}
