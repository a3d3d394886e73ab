//! Full-reference quality metrics for single images.

use std::path::Path;

use ffmpeg_io::{Frame, VideoCodec, VideoSink, frame::CHANNELS, read_image};

use crate::pipeline::FrameTransform;

const MAX_VALUE: f64 = 255.0;
const SSIM_WINDOW: usize = 11;
const SSIM_K1: f64 = 0.01;
const SSIM_K2: f64 = 0.03;

#[derive(Debug, Clone, Copy)]
pub struct ImageScores {
    pub psnr: f64,
    pub ssim: f64,
}

/// Upscales `lr`, writes the result to `output` and scores it against `hr`.
pub fn run_image(
    lr: &Path,
    hr: &Path,
    transform: &mut dyn FrameTransform,
    output: &Path,
) -> anyhow::Result<ImageScores> {
    let lr_frame = read_image(lr)?;
    let hr_frame = read_image(hr)?;
    log::info!(
        "evaluating {} ({:?}) against {} ({:?})",
        lr.display(),
        lr_frame.size(),
        hr.display(),
        hr_frame.size()
    );

    let transformed = transform.transform(&lr_frame)?;
    let elapsed = transformed.elapsed;
    log::info!(
        "Use time: {:.2}ms/{:.4}s.",
        elapsed.as_secs_f64() * 1000.0,
        elapsed.as_secs_f64()
    );
    let sr = transformed.frame;

    let mut sink = VideoSink::open(output, sr.size(), 1.0, VideoCodec::Bmp)?;
    sink.write(&sr)?;
    sink.close()?;
    log::info!("wrote {}", output.display());

    let scores = ImageScores {
        psnr: psnr(&sr, &hr_frame)?,
        ssim: ssim(&sr, &hr_frame)?,
    };
    log::info!("====================== Performance summary ======================");
    log::info!("PSNR: {:.2}", scores.psnr);
    log::info!("SSIM: {:.4}", scores.ssim);
    log::info!("============================== End ==============================");
    Ok(scores)
}

fn check_same_size(a: &Frame, b: &Frame) -> anyhow::Result<()> {
    if a.size() != b.size() {
        anyhow::bail!("image sizes differ: {:?} vs {:?}", a.size(), b.size());
    }
    Ok(())
}

/// Peak signal-to-noise ratio in dB over all channels. Identical images score
/// infinity.
pub fn psnr(a: &Frame, b: &Frame) -> anyhow::Result<f64> {
    check_same_size(a, b)?;
    let sum: f64 = a
        .data()
        .iter()
        .zip(b.data())
        .map(|(&x, &y)| {
            let d = f64::from(x) - f64::from(y);
            d * d
        })
        .sum();
    let mse = sum / a.data().len() as f64;
    if mse == 0.0 {
        return Ok(f64::INFINITY);
    }
    Ok(10.0 * (MAX_VALUE * MAX_VALUE / mse).log10())
}

/// Mean structural similarity with an 11x11 uniform window over the valid
/// region, averaged over windows and then channels.
pub fn ssim(a: &Frame, b: &Frame) -> anyhow::Result<f64> {
    check_same_size(a, b)?;
    let (width, height) = (a.width() as usize, a.height() as usize);
    if width < SSIM_WINDOW || height < SSIM_WINDOW {
        anyhow::bail!(
            "image {}x{} is smaller than the {}px ssim window",
            width,
            height,
            SSIM_WINDOW
        );
    }
    let total: f64 = (0..CHANNELS)
        .map(|channel| {
            let x = Sums::new(a, channel);
            let y = Sums::new(b, channel);
            let xy = cross_product(a, b, channel);
            ssim_channel(&x, &y, &xy, width, height)
        })
        .sum();
    Ok(total / CHANNELS as f64)
}

fn ssim_channel(x: &Sums, y: &Sums, xy: &Integral, width: usize, height: usize) -> f64 {
    let c1 = (SSIM_K1 * MAX_VALUE).powi(2);
    let c2 = (SSIM_K2 * MAX_VALUE).powi(2);
    let n = (SSIM_WINDOW * SSIM_WINDOW) as f64;

    let mut total = 0.0;
    let mut windows = 0usize;
    for top in 0..=height - SSIM_WINDOW {
        for left in 0..=width - SSIM_WINDOW {
            let mu_x = x.value.window(left, top) / n;
            let mu_y = y.value.window(left, top) / n;
            let var_x = x.square.window(left, top) / n - mu_x * mu_x;
            let var_y = y.square.window(left, top) / n - mu_y * mu_y;
            let cov = xy.window(left, top) / n - mu_x * mu_y;

            let numerator = (2.0 * mu_x * mu_y + c1) * (2.0 * cov + c2);
            let denominator = (mu_x * mu_x + mu_y * mu_y + c1) * (var_x + var_y + c2);
            total += numerator / denominator;
            windows += 1;
        }
    }
    total / windows as f64
}

/// Summed-area table with a zero row and column in front.
struct Integral {
    width: usize,
    table: Vec<f64>,
}

impl Integral {
    fn build(width: usize, height: usize, value: impl Fn(usize, usize) -> f64) -> Self {
        let stride = width + 1;
        let mut table = vec![0.0; stride * (height + 1)];
        for y in 0..height {
            let mut row = 0.0;
            for x in 0..width {
                row += value(x, y);
                table[(y + 1) * stride + x + 1] = table[y * stride + x + 1] + row;
            }
        }
        Self { width, table }
    }

    fn at(&self, x: usize, y: usize) -> f64 {
        self.table[y * (self.width + 1) + x]
    }

    fn window(&self, left: usize, top: usize) -> f64 {
        let (right, bottom) = (left + SSIM_WINDOW, top + SSIM_WINDOW);
        self.at(right, bottom) - self.at(left, bottom) - self.at(right, top) + self.at(left, top)
    }
}

/// Windowed sums of one channel (`value`) and of its square.
struct Sums {
    value: Integral,
    square: Integral,
}

impl Sums {
    fn new(frame: &Frame, channel: usize) -> Self {
        let (w, h) = (frame.width() as usize, frame.height() as usize);
        let sample = |x: usize, y: usize| f64::from(frame.data()[(y * w + x) * CHANNELS + channel]);
        Self {
            value: Integral::build(w, h, sample),
            square: Integral::build(w, h, |x, y| sample(x, y).powi(2)),
        }
    }
}

fn cross_product(a: &Frame, b: &Frame, channel: usize) -> Integral {
    let (w, h) = (a.width() as usize, a.height() as usize);
    let index = |x: usize, y: usize| (y * w + x) * CHANNELS + channel;
    Integral::build(w, h, |x, y| {
        f64::from(a.data()[index(x, y)]) * f64::from(b.data()[index(x, y)])
    })
}
