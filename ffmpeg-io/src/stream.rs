use ffmpeg_next::{Rational, codec::Parameters, format::stream};

unsafe impl Send for AvStream {}
unsafe impl Sync for AvStream {}

/// Snapshot of one demuxed stream: codec parameters plus timing.
pub struct AvStream {
    index: usize,
    parameters: Parameters,
    time_base: Rational,
    rate: Rational,
    frames: i64,
    duration: i64,
}

impl AvStream {
    pub fn index(&self) -> usize {
        self.index
    }
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }
    pub fn time_base(&self) -> Rational {
        self.time_base
    }
    pub fn rate(&self) -> Rational {
        self.rate
    }

    pub fn is_video(&self) -> bool {
        self.parameters.medium() == ffmpeg_next::media::Type::Video
    }

    pub fn width(&self) -> u32 {
        unsafe {
            let ptr = self.parameters.as_ptr() as *const ffmpeg_next::ffi::AVCodecParameters;
            (*ptr).width.max(0) as u32
        }
    }

    pub fn height(&self) -> u32 {
        unsafe {
            let ptr = self.parameters.as_ptr() as *const ffmpeg_next::ffi::AVCodecParameters;
            (*ptr).height.max(0) as u32
        }
    }

    pub fn fps(&self) -> f64 {
        if self.rate.denominator() == 0 {
            return 0.0;
        }
        self.rate.numerator() as f64 / self.rate.denominator() as f64
    }

    /// Frame counter stored in the container, 0 when the muxer did not record one.
    pub fn frames(&self) -> i64 {
        self.frames
    }

    /// Stream duration in seconds, None when unknown.
    pub fn duration_secs(&self) -> Option<f64> {
        if self.duration == ffmpeg_next::ffi::AV_NOPTS_VALUE as i64 || self.duration <= 0 {
            return None;
        }
        let tb = self.time_base;
        if tb.denominator() == 0 {
            return None;
        }
        Some(self.duration as f64 * tb.numerator() as f64 / tb.denominator() as f64)
    }
}

impl From<stream::Stream<'_>> for AvStream {
    fn from(stream: stream::Stream<'_>) -> Self {
        // avg_frame_rate is 0/0 for some raw and image inputs; r_frame_rate is the fallback.
        let avg = stream.avg_frame_rate();
        let rate = if avg.numerator() > 0 && avg.denominator() > 0 {
            avg
        } else {
            stream.rate()
        };
        Self {
            index: stream.index(),
            parameters: stream.parameters(),
            time_base: stream.time_base(),
            rate,
            frames: stream.frames(),
            duration: stream.duration(),
        }
    }
}

impl Clone for AvStream {
    fn clone(&self) -> Self {
        Self {
            index: self.index,
            parameters: self.parameters.clone(),
            time_base: self.time_base,
            rate: self.rate,
            frames: self.frames,
            duration: self.duration,
        }
    }
}

/// Metadata of the video stream a [`crate::VideoSource`] decodes. Immutable once opened.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoStream {
    pub frames_per_second: f64,
    pub frame_count: u64,
    pub frame_width: u32,
    pub frame_height: u32,
}

impl VideoStream {
    pub fn new(frames_per_second: f64, frame_count: u64, frame_width: u32, frame_height: u32) -> Self {
        Self {
            frames_per_second,
            frame_count,
            frame_width,
            frame_height,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.frame_width, self.frame_height)
    }

    /// Reads the stream metadata, falling back to the container duration when the
    /// stream has none. The frame count may still come out as zero; callers that
    /// need frames reject that themselves.
    pub fn from_av_stream(stream: &AvStream, container_duration: Option<f64>) -> anyhow::Result<Self> {
        let (width, height) = (stream.width(), stream.height());
        if width == 0 || height == 0 {
            anyhow::bail!("invalid video size {}x{}", width, height);
        }
        let fps = stream.fps();
        if !fps.is_finite() || fps <= 0.0 {
            anyhow::bail!("stream {} has no usable frame rate", stream.index());
        }
        let duration = stream.duration_secs().or(container_duration);
        Ok(Self::new(
            fps,
            estimate_frame_count(stream.frames(), duration, fps),
            width,
            height,
        ))
    }
}

/// Container frame counter when present, otherwise `duration * fps` rounded.
pub fn estimate_frame_count(frames: i64, duration_secs: Option<f64>, fps: f64) -> u64 {
    if frames > 0 {
        return frames as u64;
    }
    match duration_secs {
        Some(d) if d > 0.0 && fps > 0.0 => (d * fps).round() as u64,
        _ => 0,
    }
}

/// Converts a float frame rate into the rational ffmpeg encoders expect. Both terms
/// stay within 16 bits, which MPEG-4 Part 2 requires of its time base.
pub fn frame_rate_rational(frames_per_second: f64) -> Rational {
    unsafe { ffmpeg_next::ffi::av_d2q(frames_per_second, 65535) }.into()
}
