//! Pixel layout operations on packed RGB frames: padding, cropping, concatenation.

use ffmpeg_io::{Frame, frame::CHANNELS};

/// Black border widths in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Padding {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Padding {
    pub const fn new(left: u32, top: u32, right: u32, bottom: u32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }
}

/// Copies `src` into `dst` with its top-left corner at `(x, y)`. The caller
/// guarantees that `src` fits.
fn blit(dst: &mut Frame, src: &Frame, x: u32, y: u32) {
    let offset = x as usize * CHANNELS;
    let len = src.stride();
    for row in 0..src.height() {
        dst.row_mut(y + row)[offset..offset + len].copy_from_slice(src.row(row));
    }
}

pub fn pad(frame: &Frame, padding: Padding) -> Frame {
    let width = padding.left + frame.width() + padding.right;
    let height = padding.top + frame.height() + padding.bottom;
    let mut out = Frame::black(width, height);
    blit(&mut out, frame, padding.left, padding.top);
    out
}

pub fn crop(frame: &Frame, x: u32, y: u32, width: u32, height: u32) -> anyhow::Result<Frame> {
    if width == 0 || height == 0 {
        anyhow::bail!("empty crop {}x{}", width, height);
    }
    let fits_x = x.checked_add(width).is_some_and(|r| r <= frame.width());
    let fits_y = y.checked_add(height).is_some_and(|b| b <= frame.height());
    if !fits_x || !fits_y {
        anyhow::bail!(
            "crop {}x{}+{}+{} outside {}x{} frame",
            width,
            height,
            x,
            y,
            frame.width(),
            frame.height()
        );
    }
    let start = x as usize * CHANNELS;
    let len = width as usize * CHANNELS;
    let mut data = Vec::with_capacity(len * height as usize);
    for row in y..y + height {
        data.extend_from_slice(&frame.row(row)[start..start + len]);
    }
    Frame::new(width, height, data)
}

/// Square tiles of side `size` at the top-left, top-right, bottom-left and
/// bottom-right corners and the center, in that order. Center offsets round half
/// to even.
pub fn five_crop(frame: &Frame, size: u32) -> anyhow::Result<[Frame; 5]> {
    let (w, h) = frame.size();
    if size == 0 || size > w || size > h {
        anyhow::bail!("tile {} does not fit {}x{} frame", size, w, h);
    }
    let center_x = (f64::from(w - size) / 2.0).round_ties_even() as u32;
    let center_y = (f64::from(h - size) / 2.0).round_ties_even() as u32;
    Ok([
        crop(frame, 0, 0, size, size)?,
        crop(frame, w - size, 0, size, size)?,
        crop(frame, 0, h - size, size, size)?,
        crop(frame, w - size, h - size, size, size)?,
        crop(frame, center_x, center_y, size, size)?,
    ])
}

/// Joins frames left to right. All frames must share one height.
pub fn hconcat(frames: &[Frame]) -> anyhow::Result<Frame> {
    let first = frames
        .first()
        .ok_or_else(|| anyhow::anyhow!("nothing to concatenate"))?;
    let height = first.height();
    if let Some(odd) = frames.iter().find(|f| f.height() != height) {
        anyhow::bail!(
            "horizontal concat needs height {}, got {}",
            height,
            odd.height()
        );
    }
    let width = frames.iter().map(Frame::width).sum();
    let mut out = Frame::black(width, height);
    let mut x = 0;
    for frame in frames {
        blit(&mut out, frame, x, 0);
        x += frame.width();
    }
    Ok(out)
}

/// Stacks frames top to bottom. All frames must share one width.
pub fn vconcat(frames: &[Frame]) -> anyhow::Result<Frame> {
    let first = frames
        .first()
        .ok_or_else(|| anyhow::anyhow!("nothing to concatenate"))?;
    let width = first.width();
    if let Some(odd) = frames.iter().find(|f| f.width() != width) {
        anyhow::bail!(
            "vertical concat needs width {}, got {}",
            width,
            odd.width()
        );
    }
    let mut data = Vec::with_capacity(frames.iter().map(|f| f.data().len()).sum());
    for frame in frames {
        data.extend_from_slice(frame.data());
    }
    let height = frames.iter().map(Frame::height).sum();
    Frame::new(width, height, data)
}
