use std::time::Duration;

use ffmpeg_io::{Frame, VideoCodec};
use serde::Serialize;

use super::{
    RunConfig,
    media::{FrameSink, FrameSource, MediaOpener},
    monitor::Monitor,
    transform::FrameTransform,
};
use crate::{
    compare::{FrameCompositor, OutputGeometry},
    error::PipelineError,
    report::RunReport,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum RunState {
    #[default]
    Init,
    Running,
    Done,
    Cancelled,
    Failed,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineState {
    pub run_state: RunState,
    pub frames_processed: u64,
    pub cancelled: bool,
    pub transform_time: Duration,
}

/// Everything a run holds open. Dropping it releases the source; the sinks are
/// finalized by [`Session::close`].
struct Session<M: MediaOpener> {
    source: M::Source,
    geometry: OutputGeometry,
    compositor: FrameCompositor,
    sr_sink: M::Sink,
    compare_sink: M::Sink,
}

impl<M: MediaOpener> Session<M> {
    /// Closes both sinks, attempting the second even when the first fails.
    fn close(mut self) -> Result<(), PipelineError> {
        let sr = self.sr_sink.close().map_err(|cause| PipelineError::Close {
            target: "sr sink",
            cause,
        });
        let compare = self
            .compare_sink
            .close()
            .map_err(|cause| PipelineError::Close {
                target: "compare sink",
                cause,
            });
        log::info!(
            "finalized outputs: {} upscaled frames, {} comparison frames",
            self.sr_sink.frames_written(),
            self.compare_sink.frames_written()
        );
        sr.and(compare)
    }

    /// Closes both sinks while another error is already propagating.
    fn close_logged(self) {
        if let Err(e) = self.close() {
            log::error!("{}", e);
        }
    }
}

/// Sequential driver of a comparison run. One instance runs one video at a time;
/// `run` may be called again for a fresh run.
pub struct PipelineController<'a> {
    config: RunConfig,
    transform: &'a mut dyn FrameTransform,
    monitor: &'a mut dyn Monitor,
    state: PipelineState,
}

impl<'a> PipelineController<'a> {
    pub fn new(
        config: RunConfig,
        transform: &'a mut dyn FrameTransform,
        monitor: &'a mut dyn Monitor,
    ) -> Self {
        Self {
            config,
            transform,
            monitor,
            state: PipelineState::default(),
        }
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn run<M: MediaOpener>(&mut self, media: &mut M) -> Result<RunReport, PipelineError> {
        self.state = PipelineState::default();

        let mut session = match self.open(media) {
            Ok(session) => session,
            Err(e) => {
                self.state.run_state = RunState::Failed;
                log::error!("pipeline init failed: {}", e);
                return Err(e);
            }
        };
        let geometry = session.geometry;
        let frame_count = session.source.stream().frame_count;

        self.state.run_state = RunState::Running;
        log::info!(
            "running {} ({} frames): {:?} -> {:?}, compare {:?}",
            self.config.source.display(),
            frame_count,
            geometry.source_size,
            geometry.sr_size,
            geometry.compare_size
        );

        let outcome = match self.process(&mut session, frame_count) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.state.run_state = RunState::Failed;
                log::error!(
                    "pipeline failed after {} frames: {}",
                    self.state.frames_processed,
                    e
                );
                session.close_logged();
                return Err(e);
            }
        };

        if let Err(e) = session.close() {
            self.state.run_state = RunState::Failed;
            log::error!("{}", e);
            return Err(e);
        }
        self.state.run_state = outcome;

        Ok(RunReport {
            outcome,
            frames_processed: self.state.frames_processed,
            frame_count,
            sr_size: geometry.sr_size,
            compare_size: geometry.compare_size,
            transform_time_total: self.state.transform_time,
            sr_path: self.config.sr_path(),
            compare_path: self.config.compare_path(),
        })
    }

    fn open<M: MediaOpener>(&mut self, media: &mut M) -> Result<Session<M>, PipelineError> {
        let factor = self.config.upscale_factor;
        let source = media
            .open_source(&self.config.source)
            .map_err(|e| PipelineError::StreamOpen(e.context(format!("open {}", self.config.source.display()))))?;
        let stream = *source.stream();

        let geometry = OutputGeometry::derive(&stream, factor)?;
        if self.transform.upscale_factor() != factor {
            return Err(PipelineError::stream_open(format!(
                "transform upscales by {}, run expects {}",
                self.transform.upscale_factor(),
                factor
            )));
        }
        check_codec_size(self.config.codec, "upscaled", geometry.sr_size)?;
        check_codec_size(self.config.codec, "compare", geometry.compare_size)?;
        let compositor = FrameCompositor::new(geometry).map_err(PipelineError::StreamOpen)?;

        let fps = stream.frames_per_second;
        let sr_path = self.config.sr_path();
        let mut sr_sink = media
            .open_sink(&sr_path, geometry.sr_size, fps, self.config.codec)
            .map_err(|e| PipelineError::StreamOpen(e.context(format!("create {}", sr_path.display()))))?;

        let compare_path = self.config.compare_path();
        let compare_sink = match media.open_sink(&compare_path, geometry.compare_size, fps, self.config.codec) {
            Ok(sink) => sink,
            Err(e) => {
                if let Err(close) = sr_sink.close() {
                    log::error!("failed to finalize sr sink: {:#}", close);
                }
                return Err(PipelineError::StreamOpen(
                    e.context(format!("create {}", compare_path.display())),
                ));
            }
        };

        Ok(Session {
            source,
            geometry,
            compositor,
            sr_sink,
            compare_sink,
        })
    }

    fn process<M: MediaOpener>(
        &mut self,
        session: &mut Session<M>,
        frame_count: u64,
    ) -> Result<RunState, PipelineError> {
        loop {
            let index = self.state.frames_processed + 1;
            let source = match session.source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    log::info!("end of stream after {} frames", self.state.frames_processed);
                    return Ok(RunState::Done);
                }
                Err(cause) => return Err(PipelineError::Read { frame: index, cause }),
            };

            let transformed = self
                .transform
                .transform(&source)
                .map_err(|cause| PipelineError::Transform { frame: index, cause })?;
            self.state.transform_time += transformed.elapsed;
            log::debug!(
                "frame {}: transform {:.1} ms",
                index,
                transformed.elapsed.as_secs_f64() * 1000.0
            );
            let sr = transformed.frame;

            let compare = session.compositor.compose(index, &source, &sr)?;

            write_checked(&mut session.sr_sink, "sr sink", index, &sr)?;
            write_checked(&mut session.compare_sink, "compare sink", index, &compare)?;
            self.state.frames_processed = index;

            self.log_progress(frame_count);
            if self.config.interactive {
                self.show(&compare);
            }
            if self.monitor.poll_cancel() {
                self.state.cancelled = true;
                log::info!("cancelled after {} frames", index);
                return Ok(RunState::Cancelled);
            }
        }
    }

    fn show(&mut self, frame: &Frame) {
        if let Err(e) = self.monitor.show(frame) {
            log::warn!("preview failed: {:#}", e);
        }
    }

    fn log_progress(&self, frame_count: u64) {
        let interval = self.config.progress_interval;
        let done = self.state.frames_processed;
        if interval == 0 || done % interval != 0 {
            return;
        }
        let average = self.state.transform_time.as_secs_f64() * 1000.0 / done as f64;
        log::info!(
            "processed {}/{} frames, transform {:.1} ms/frame",
            done,
            frame_count,
            average
        );
    }
}

fn check_codec_size(codec: VideoCodec, output: &str, size: (u32, u32)) -> Result<(), PipelineError> {
    if codec.requires_even_size() && (size.0 % 2 != 0 || size.1 % 2 != 0) {
        return Err(PipelineError::stream_open(format!(
            "{} needs even frame sizes, {} output would be {}x{}",
            codec, output, size.0, size.1
        )));
    }
    Ok(())
}

fn write_checked<S: FrameSink>(
    sink: &mut S,
    target: &'static str,
    frame: u64,
    image: &Frame,
) -> Result<(), PipelineError> {
    if image.size() != sink.size() {
        return Err(PipelineError::Shape {
            target,
            expected: sink.size(),
            actual: image.size(),
        });
    }
    sink.write(image)
        .map_err(|cause| PipelineError::Write { frame, target, cause })
}

#[cfg(test)]
#[path = "controller_test.rs"]
mod controller_test;
