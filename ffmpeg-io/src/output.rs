use std::path::{Path, PathBuf};

use ffmpeg_next::Rational;

use crate::{
    codec::VideoCodec,
    encoder::{Encoder, Settings},
    frame::Frame,
};

/// An encoded video file being written frame by frame.
///
/// The container is finalized by [`VideoSink::close`], which is idempotent and
/// also runs on drop, so a file that received fewer frames than planned still
/// ends up playable.
pub struct VideoSink {
    path: PathBuf,
    inner: ffmpeg_next::format::context::Output,
    encoder: Encoder,
    stream_index: usize,
    size: (u32, u32),
    frames_written: u64,
    have_written_trailer: bool,
}

impl VideoSink {
    pub fn open(
        path: impl AsRef<Path>,
        size: (u32, u32),
        frames_per_second: f64,
        codec: VideoCodec,
    ) -> anyhow::Result<Self> {
        Self::open_with(
            path,
            Settings {
                width: size.0,
                height: size.1,
                frames_per_second,
                codec,
                ..Default::default()
            },
        )
    }

    pub fn open_with(path: impl AsRef<Path>, settings: Settings) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if settings.width == 0 || settings.height == 0 {
            anyhow::bail!("invalid sink size {}x{}", settings.width, settings.height);
        }
        let size = (settings.width, settings.height);

        let mut output = ffmpeg_next::format::output(&path)
            .map_err(|e| anyhow::anyhow!("create {}: {}", path.display(), e))?;
        let global_header = output
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        let encoder = Encoder::new(settings, global_header)?;
        let stream_index = {
            let mut writer_stream = output.add_stream(encoder.codec())?;
            writer_stream.set_parameters(encoder.inner());
            writer_stream.set_time_base(encoder.time_base());
            writer_stream.index()
        };
        output
            .write_header()
            .map_err(|e| anyhow::anyhow!("write header {}: {}", path.display(), e))?;

        log::info!(
            "sink opened: {} {}x{} ({})",
            path.display(),
            size.0,
            size.1,
            encoder.codec().name()
        );

        Ok(Self {
            path,
            inner: output,
            encoder,
            stream_index,
            size,
            frames_written: 0,
            have_written_trailer: false,
        })
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn is_closed(&self) -> bool {
        self.have_written_trailer
    }

    /// Encodes one frame. The frame must match the size the sink was opened with.
    pub fn write(&mut self, frame: &Frame) -> anyhow::Result<()> {
        if self.have_written_trailer {
            anyhow::bail!("sink {} is closed", self.path.display());
        }
        if frame.size() != self.size {
            anyhow::bail!(
                "frame {:?} does not match sink {} size {:?}",
                frame.size(),
                self.path.display(),
                self.size
            );
        }
        self.encoder.send_frame(frame)?;
        self.write_pending_packets()?;
        self.frames_written += 1;
        Ok(())
    }

    /// Flushes the encoder and writes the trailer. Later calls are no-ops.
    pub fn close(&mut self) -> anyhow::Result<()> {
        if self.have_written_trailer {
            return Ok(());
        }
        self.have_written_trailer = true;

        let flushed = match self.encoder.send_eof() {
            Ok(()) => self.write_pending_packets(),
            Err(e) => Err(e),
        };
        let trailer = self
            .inner
            .write_trailer()
            .map_err(|e| anyhow::anyhow!("write trailer {}: {}", self.path.display(), e));
        log::info!(
            "sink closed: {} ({} frames)",
            self.path.display(),
            self.frames_written
        );
        flushed.and(trailer)
    }

    fn write_pending_packets(&mut self) -> anyhow::Result<()> {
        let out_time_base = self.output_time_base()?;
        while let Some(mut packet) = self.encoder.receive_packet()? {
            packet.set_stream(self.stream_index);
            packet.set_position(-1);
            packet.rescale_ts(self.encoder.time_base(), out_time_base);
            packet.write_interleaved(&mut self.inner)?;
        }
        Ok(())
    }

    fn output_time_base(&self) -> anyhow::Result<Rational> {
        self.inner
            .stream(self.stream_index)
            .map(|s| s.time_base())
            .ok_or_else(|| anyhow::anyhow!("stream {} not found", self.stream_index))
    }
}

impl Drop for VideoSink {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::error!("closing {} on drop: {:#}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
#[path = "output_test.rs"]
mod output_test;
