//! I/O seams of the controller. The ffmpeg-backed implementations are the only
//! ones used outside tests.

use std::path::Path;

use ffmpeg_io::{Frame, VideoCodec, VideoSink, VideoSource, VideoStream};

pub trait FrameSource {
    fn stream(&self) -> &VideoStream;

    /// Next decoded frame in presentation order; `None` at end of stream.
    fn next_frame(&mut self) -> anyhow::Result<Option<Frame>>;
}

pub trait FrameSink {
    fn size(&self) -> (u32, u32);

    fn write(&mut self, frame: &Frame) -> anyhow::Result<()>;

    /// Finalizes the container. Must be safe to call more than once.
    fn close(&mut self) -> anyhow::Result<()>;

    fn frames_written(&self) -> u64;
}

/// Creates the source and both sinks of a run.
pub trait MediaOpener {
    type Source: FrameSource;
    type Sink: FrameSink;

    fn open_source(&mut self, path: &Path) -> anyhow::Result<Self::Source>;

    fn open_sink(
        &mut self,
        path: &Path,
        size: (u32, u32),
        frames_per_second: f64,
        codec: VideoCodec,
    ) -> anyhow::Result<Self::Sink>;
}

impl FrameSource for VideoSource {
    fn stream(&self) -> &VideoStream {
        VideoSource::stream(self)
    }

    fn next_frame(&mut self) -> anyhow::Result<Option<Frame>> {
        VideoSource::next_frame(self)
    }
}

impl FrameSink for VideoSink {
    fn size(&self) -> (u32, u32) {
        VideoSink::size(self)
    }

    fn write(&mut self, frame: &Frame) -> anyhow::Result<()> {
        VideoSink::write(self, frame)
    }

    fn close(&mut self) -> anyhow::Result<()> {
        VideoSink::close(self)
    }

    fn frames_written(&self) -> u64 {
        VideoSink::frames_written(self)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FfmpegMedia;

impl MediaOpener for FfmpegMedia {
    type Source = VideoSource;
    type Sink = VideoSink;

    fn open_source(&mut self, path: &Path) -> anyhow::Result<VideoSource> {
        VideoSource::open(path)
    }

    fn open_sink(
        &mut self,
        path: &Path,
        size: (u32, u32),
        frames_per_second: f64,
        codec: VideoCodec,
    ) -> anyhow::Result<VideoSink> {
        VideoSink::open(path, size, frames_per_second, codec)
    }
}
