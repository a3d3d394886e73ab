/// Registers FFmpeg components and lowers libav's own logging to warnings.
/// Call once at startup before opening any source or sink.
pub fn init() -> anyhow::Result<()> {
    ffmpeg_next::init().map_err(|e| anyhow::anyhow!("ffmpeg_next init: {}", e))?;
    ffmpeg_next::util::log::set_level(ffmpeg_next::util::log::Level::Warning);
    Ok(())
}

pub mod codec;
pub mod decoder;
pub mod encoder;
pub mod frame;
pub mod input;
pub mod metadata;
pub mod output;
pub mod scaler;
pub mod stream;

pub use codec::VideoCodec;
pub use frame::Frame;
pub use input::{VideoSource, read_image};
pub use metadata::{MediaInfo, count_video_packets, probe};
pub use output::VideoSink;
pub use scaler::{Filter, FrameScaler};
pub use stream::VideoStream;
