use std::path::Path;

use ffmpeg_next::format::Pixel;

use crate::{
    decoder::Decoder,
    frame::Frame,
    metadata::container_duration,
    scaler::{Filter, Scaler},
    stream::{AvStream, VideoStream},
};

/// Decodes the best video stream of a file into RGB24 frames, one at a time.
///
/// The sequence is finite and single pass: each frame is returned once, in file
/// order. Opening the same path again starts an independent sequence.
pub struct VideoSource {
    inner: ffmpeg_next::format::context::Input,
    stream: AvStream,
    metadata: VideoStream,
    decoder: Decoder,
    scaler: Option<Scaler>,
    eof_sent: bool,
    finished: bool,
}

impl VideoSource {
    /// Opens `path` and fails when it has no decodable video stream or reports no frames.
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let source = Self::open_stream(path.as_ref())?;
        if source.metadata.frame_count == 0 {
            anyhow::bail!("{} reports zero frames", path.as_ref().display());
        }
        Ok(source)
    }

    fn open_stream(path: &Path) -> anyhow::Result<Self> {
        let input = ffmpeg_next::format::input(path)
            .map_err(|e| anyhow::anyhow!("open {}: {}", path.display(), e))?;

        let stream = input
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .map(AvStream::from)
            .ok_or_else(|| anyhow::anyhow!("{} has no video stream", path.display()))?;

        let metadata = VideoStream::from_av_stream(&stream, container_duration(&input))?;
        let decoder = Decoder::new(&stream)?;

        log::debug!(
            "opened {}: stream {} {}x{} @ {:.3} fps, {} frames",
            path.display(),
            stream.index(),
            metadata.frame_width,
            metadata.frame_height,
            metadata.frames_per_second,
            metadata.frame_count
        );

        Ok(Self {
            inner: input,
            stream,
            metadata,
            decoder,
            scaler: None,
            eof_sent: false,
            finished: false,
        })
    }

    pub fn stream(&self) -> &VideoStream {
        &self.metadata
    }

    /// Returns the next frame in file order, `None` once the stream is exhausted.
    pub fn next_frame(&mut self) -> anyhow::Result<Option<Frame>> {
        if self.finished {
            return Ok(None);
        }
        loop {
            if let Some(frame) = self.decoder.receive_frame()? {
                return self.convert(frame).map(Some);
            }
            if self.eof_sent {
                self.finished = true;
                return Ok(None);
            }
            match self.inner.packets().next() {
                Some((stream, packet)) => {
                    if stream.index() == self.stream.index() {
                        self.decoder.send_packet(packet, stream.time_base())?;
                    }
                }
                None => {
                    self.decoder.send_eof()?;
                    self.eof_sent = true;
                }
            }
        }
    }

    pub fn frames(&mut self) -> Frames<'_> {
        Frames { source: self }
    }

    fn convert(&mut self, frame: ffmpeg_next::frame::Video) -> anyhow::Result<Frame> {
        let (width, height) = (frame.width(), frame.height());
        if (width, height) != self.metadata.size() {
            anyhow::bail!(
                "decoded frame {}x{} differs from stream size {}x{}",
                width,
                height,
                self.metadata.frame_width,
                self.metadata.frame_height
            );
        }
        if frame.format() == Pixel::RGB24 {
            return Frame::from_video(&frame);
        }
        if self.scaler.is_none() {
            self.scaler = Some(Scaler::new(
                (frame.format(), width, height),
                (Pixel::RGB24, width, height),
                Filter::Bicubic,
            )?);
        }
        let mut converted = ffmpeg_next::frame::Video::empty();
        if let Some(scaler) = self.scaler.as_mut() {
            scaler.run(&frame, &mut converted)?;
        }
        Frame::from_video(&converted)
    }
}

/// Iterator adapter over [`VideoSource::next_frame`].
pub struct Frames<'a> {
    source: &'a mut VideoSource,
}

impl Iterator for Frames<'_> {
    type Item = anyhow::Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.source.next_frame().transpose()
    }
}

/// Decodes the first picture of a still image (or video) file.
pub fn read_image(path: impl AsRef<Path>) -> anyhow::Result<Frame> {
    let path = path.as_ref();
    let mut source = VideoSource::open_stream(path)?;
    source
        .next_frame()?
        .ok_or_else(|| anyhow::anyhow!("{} decoded no picture", path.display()))
}
