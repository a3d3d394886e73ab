use ffmpeg_next::{Dictionary, Rational};

use crate::{
    codec::VideoCodec,
    frame::Frame,
    scaler::{Filter, Scaler},
    stream::frame_rate_rational,
};

#[derive(Debug, Clone)]
pub struct Settings {
    pub width: u32,
    pub height: u32,
    pub frames_per_second: f64,
    pub keyframe_interval: u32,
    pub codec: VideoCodec,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            frames_per_second: 25.0,
            keyframe_interval: 25,
            codec: VideoCodec::Mpeg4,
        }
    }
}

/// Video encoder fed with RGB frames. Frames are converted to the codec's pixel
/// format and stamped with consecutive pts in a `1/fps` time base.
pub struct Encoder {
    codec: ffmpeg_next::Codec,
    inner: ffmpeg_next::codec::encoder::Video,
    encoder_time_base: Rational,
    frame_index: i64,
    scaler: Option<Scaler>,
    settings: Settings,
}

impl Encoder {
    pub fn new(settings: Settings, global_header: bool) -> anyhow::Result<Self> {
        let name = settings.codec.encoder_name();
        let codec = ffmpeg_next::encoder::find_by_name(name)
            .ok_or(anyhow::anyhow!("codec not found: {}", name))?;

        let frame_rate = frame_rate_rational(settings.frames_per_second);
        if frame_rate.numerator() <= 0 || frame_rate.denominator() <= 0 {
            anyhow::bail!("invalid frame rate {}", settings.frames_per_second);
        }
        let encoder_time_base = frame_rate.invert();

        let mut encoder = ffmpeg_next::codec::Context::new_with_codec(codec)
            .encoder()
            .video()?;
        encoder.set_width(settings.width);
        encoder.set_height(settings.height);
        encoder.set_format(settings.codec.pixel_format());
        encoder.set_frame_rate(Some(frame_rate));
        encoder.set_time_base(encoder_time_base);
        encoder.set_gop(settings.keyframe_interval);
        // Packets then come out in display order, one per frame.
        encoder.set_max_b_frames(0);
        if global_header {
            encoder.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }

        let mut opts = Dictionary::new();
        if settings.codec == VideoCodec::H264 {
            opts.set("preset", "ultrafast");
        }
        let encoder = encoder
            .open_with(opts)
            .map_err(|e| anyhow::anyhow!("open encoder {}: {}", name, e))?;
        log::info!(
            "encoder opened: {} {}x{} @ {}/{}",
            name,
            settings.width,
            settings.height,
            frame_rate.numerator(),
            frame_rate.denominator()
        );

        Ok(Self {
            codec,
            inner: encoder,
            encoder_time_base,
            frame_index: 0,
            scaler: None,
            settings,
        })
    }

    pub fn codec(&self) -> ffmpeg_next::Codec {
        self.codec
    }

    pub fn time_base(&self) -> Rational {
        self.encoder_time_base
    }

    pub fn inner(&self) -> &ffmpeg_next::codec::encoder::Video {
        &self.inner
    }

    pub fn send_frame(&mut self, frame: &Frame) -> anyhow::Result<()> {
        if frame.size() != (self.settings.width, self.settings.height) {
            anyhow::bail!(
                "frame {:?} does not match encoder size {}x{}",
                frame.size(),
                self.settings.width,
                self.settings.height
            );
        }
        let rgb = frame.to_video();
        let target = self.settings.codec.pixel_format();
        if self.scaler.is_none() {
            self.scaler = Some(Scaler::new(
                (rgb.format(), rgb.width(), rgb.height()),
                (target, self.settings.width, self.settings.height),
                Filter::Bicubic,
            )?);
        }
        let mut converted = ffmpeg_next::frame::Video::empty();
        if let Some(scaler) = self.scaler.as_mut() {
            scaler.run(&rgb, &mut converted)?;
        }
        converted.set_pts(Some(self.frame_index));
        self.inner.send_frame(&converted)?;
        self.frame_index += 1;
        Ok(())
    }

    pub fn send_eof(&mut self) -> anyhow::Result<()> {
        self.inner.send_eof()?;
        Ok(())
    }

    pub fn receive_packet(&mut self) -> anyhow::Result<Option<ffmpeg_next::Packet>> {
        let mut packet = ffmpeg_next::Packet::empty();
        match self.inner.receive_packet(&mut packet) {
            Ok(()) => Ok(Some(packet)),
            Err(ffmpeg_next::Error::Other { errno }) if errno == ffmpeg_next::util::error::EAGAIN => {
                Ok(None)
            }
            Err(ffmpeg_next::Error::Eof) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}
