//! Container inspection for the `probe` command and for checking written files.

use std::fmt;
use std::path::Path;

use ffmpeg_next::Rational;

use crate::stream::AvStream;

#[derive(Debug, Clone)]
pub struct StreamInfo {
    pub index: usize,
    /// "video", "audio", "subtitle", ...
    pub kind: String,
    /// Codec id in lower case, e.g. "mpeg4".
    pub codec: String,
    pub time_base: Rational,
    pub frame_rate: Rational,
    /// Container frame counter; 0 when the muxer does not record it.
    pub frame_count: i64,
    /// `(width, height)` for video streams.
    pub size: Option<(u32, u32)>,
}

impl StreamInfo {
    pub fn is_video(&self) -> bool {
        self.size.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct MediaInfo {
    pub format_name: String,
    pub duration_secs: Option<f64>,
    /// Bits per second, 0 if unknown.
    pub bit_rate: i64,
    pub streams: Vec<StreamInfo>,
}

impl MediaInfo {
    pub fn first_video(&self) -> Option<&StreamInfo> {
        self.streams.iter().find(|s| s.is_video())
    }
}

impl fmt::Display for MediaInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "format: {}", self.format_name)?;
        match self.duration_secs {
            Some(d) => write!(f, ", duration {:.3} s", d)?,
            None => write!(f, ", duration unknown")?,
        }
        writeln!(f, ", {} kb/s", self.bit_rate / 1000)?;
        for s in &self.streams {
            write!(f, "  #{} {} {}", s.index, s.kind, s.codec)?;
            if let Some((w, h)) = s.size {
                write!(f, " {}x{}", w, h)?;
            }
            writeln!(
                f,
                ", {}/{} fps, {} frames, time base {}/{}",
                s.frame_rate.numerator(),
                s.frame_rate.denominator(),
                s.frame_count,
                s.time_base.numerator(),
                s.time_base.denominator()
            )?;
        }
        Ok(())
    }
}

/// Reads container and stream headers without decoding.
pub fn probe(path: impl AsRef<Path>) -> anyhow::Result<MediaInfo> {
    let path = path.as_ref();
    let input = ffmpeg_next::format::input(path)
        .map_err(|e| anyhow::anyhow!("open {}: {}", path.display(), e))?;

    let streams = input
        .streams()
        .map(|stream| {
            let stream = AvStream::from(stream);
            StreamInfo {
                index: stream.index(),
                kind: format!("{:?}", stream.parameters().medium()).to_lowercase(),
                codec: format!("{:?}", stream.parameters().id()).to_lowercase(),
                time_base: stream.time_base(),
                frame_rate: stream.rate(),
                frame_count: stream.frames(),
                size: stream
                    .is_video()
                    .then(|| (stream.width(), stream.height())),
            }
        })
        .collect();

    Ok(MediaInfo {
        format_name: input.format().name().to_string(),
        duration_secs: container_duration(&input),
        bit_rate: input.bit_rate(),
        streams,
    })
}

/// Container duration in seconds, `None` when the demuxer does not know it.
pub(crate) fn container_duration(input: &ffmpeg_next::format::context::Input) -> Option<f64> {
    // AV_TIME_BASE units, i.e. microseconds.
    let duration = input.duration();
    (duration != ffmpeg_next::ffi::AV_NOPTS_VALUE as i64 && duration > 0)
        .then(|| duration as f64 / 1_000_000.0)
}

/// Counts the packets of the best video stream by reading the whole file. For
/// encodes without B-frames this equals the number of frames written.
pub fn count_video_packets(path: impl AsRef<Path>) -> anyhow::Result<u64> {
    let path = path.as_ref();
    let mut input = ffmpeg_next::format::input(path)?;
    let index = input
        .streams()
        .best(ffmpeg_next::media::Type::Video)
        .map(|s| s.index())
        .ok_or_else(|| anyhow::anyhow!("{} has no video stream", path.display()))?;
    let count = input
        .packets()
        .filter(|(stream, _)| stream.index() == index)
        .count();
    Ok(count as u64)
}
