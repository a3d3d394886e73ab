// ============================================================================
// PipelineController Tests
// ============================================================================

use std::{
    cell::RefCell,
    collections::VecDeque,
    path::{Path, PathBuf},
    rc::Rc,
};

use ffmpeg_io::{Filter, Frame, VideoCodec, VideoStream};

use super::{PipelineController, RunState};
use crate::{
    error::PipelineError,
    pipeline::{
        FfmpegMedia, RunConfig,
        media::{FrameSink, FrameSource, MediaOpener},
        monitor::Monitor,
        transform::{FrameTransform, ScaleTransform},
    },
};

// ------------------------------------------------------------------------
// Fakes
// ------------------------------------------------------------------------

#[derive(Debug, Default)]
struct SinkRecord {
    path: PathBuf,
    size: (u32, u32),
    frames: Vec<Frame>,
    closes: u32,
}

#[derive(Debug, Default)]
struct MediaLog {
    sources_opened: u32,
    sources_dropped: u32,
    sinks: Vec<SinkRecord>,
}

type Shared = Rc<RefCell<MediaLog>>;

struct FakeSource {
    stream: VideoStream,
    frames: VecDeque<Frame>,
    fail_read_at: Option<u64>,
    reads: u64,
    log: Shared,
}

impl FrameSource for FakeSource {
    fn stream(&self) -> &VideoStream {
        &self.stream
    }

    fn next_frame(&mut self) -> anyhow::Result<Option<Frame>> {
        self.reads += 1;
        if self.fail_read_at == Some(self.reads) {
            anyhow::bail!("corrupt packet");
        }
        Ok(self.frames.pop_front())
    }
}

impl Drop for FakeSource {
    fn drop(&mut self) {
        self.log.borrow_mut().sources_dropped += 1;
    }
}

struct FakeSink {
    id: usize,
    /// 1-based write number that fails.
    fail_write_at: Option<u64>,
    fail_close: bool,
    log: Shared,
}

impl FrameSink for FakeSink {
    fn size(&self) -> (u32, u32) {
        self.log.borrow().sinks[self.id].size
    }

    fn write(&mut self, frame: &Frame) -> anyhow::Result<()> {
        let mut log = self.log.borrow_mut();
        let record = &mut log.sinks[self.id];
        if record.closes > 0 {
            anyhow::bail!("write after close");
        }
        if self.fail_write_at == Some(record.frames.len() as u64 + 1) {
            anyhow::bail!("encoder error");
        }
        record.frames.push(frame.clone());
        Ok(())
    }

    fn close(&mut self) -> anyhow::Result<()> {
        self.log.borrow_mut().sinks[self.id].closes += 1;
        if self.fail_close {
            anyhow::bail!("trailer write failed");
        }
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.log.borrow().sinks[self.id].frames.len() as u64
    }
}

struct FakeMedia {
    size: (u32, u32),
    frame_count: u32,
    fail_read_at: Option<u64>,
    /// Index of the `open_sink` call that fails.
    fail_sink_open: Option<usize>,
    /// `(sink index, 1-based write number)` that fails.
    fail_write_at: Option<(usize, u64)>,
    /// Index of the sink whose close fails.
    fail_close: Option<usize>,
    log: Shared,
}

impl FakeMedia {
    fn new(size: (u32, u32), frame_count: u32) -> Self {
        Self {
            size,
            frame_count,
            fail_read_at: None,
            fail_sink_open: None,
            fail_write_at: None,
            fail_close: None,
            log: Shared::default(),
        }
    }

    fn sink(&self, id: usize) -> std::cell::Ref<'_, SinkRecord> {
        std::cell::Ref::map(self.log.borrow(), |log| &log.sinks[id])
    }
}

impl MediaOpener for FakeMedia {
    type Source = FakeSource;
    type Sink = FakeSink;

    fn open_source(&mut self, _path: &Path) -> anyhow::Result<FakeSource> {
        self.log.borrow_mut().sources_opened += 1;
        let frames = (0..self.frame_count)
            .map(|i| pattern_frame(self.size, i))
            .collect();
        Ok(FakeSource {
            stream: VideoStream::new(25.0, u64::from(self.frame_count), self.size.0, self.size.1),
            frames,
            fail_read_at: self.fail_read_at,
            reads: 0,
            log: self.log.clone(),
        })
    }

    fn open_sink(
        &mut self,
        path: &Path,
        size: (u32, u32),
        _frames_per_second: f64,
        _codec: VideoCodec,
    ) -> anyhow::Result<FakeSink> {
        let mut log = self.log.borrow_mut();
        let id = log.sinks.len();
        if self.fail_sink_open == Some(id) {
            anyhow::bail!("disk full");
        }
        log.sinks.push(SinkRecord {
            path: path.to_path_buf(),
            size,
            ..Default::default()
        });
        Ok(FakeSink {
            id,
            fail_write_at: self
                .fail_write_at
                .and_then(|(sink, write)| (sink == id).then_some(write)),
            fail_close: self.fail_close == Some(id),
            log: self.log.clone(),
        })
    }
}

/// Requests a stop on poll number `cancel_after` and counts previews.
#[derive(Default)]
struct CountingMonitor {
    cancel_after: Option<u64>,
    polls: u64,
    shows: u64,
}

impl Monitor for CountingMonitor {
    fn show(&mut self, _frame: &Frame) -> anyhow::Result<()> {
        self.shows += 1;
        Ok(())
    }

    fn poll_cancel(&mut self) -> bool {
        self.polls += 1;
        self.cancel_after.is_some_and(|limit| self.polls >= limit)
    }
}

/// Upscales normally until `fail_at`, then errors.
struct FailingTransform {
    inner: ScaleTransform,
    calls: u64,
    fail_at: u64,
}

impl FrameTransform for FailingTransform {
    fn upscale_factor(&self) -> u32 {
        self.inner.upscale_factor()
    }

    fn infer(&mut self, frame: &Frame) -> anyhow::Result<Frame> {
        self.calls += 1;
        if self.calls == self.fail_at {
            anyhow::bail!("device lost");
        }
        self.inner.infer(frame)
    }
}

/// Claims factor 4 but returns frames one pixel too narrow.
struct CroppingTransform;

impl FrameTransform for CroppingTransform {
    fn upscale_factor(&self) -> u32 {
        4
    }

    fn infer(&mut self, frame: &Frame) -> anyhow::Result<Frame> {
        Ok(Frame::black(frame.width() * 4 - 1, frame.height() * 4))
    }
}

fn pattern_frame(size: (u32, u32), index: u32) -> Frame {
    let (width, height) = size;
    let mut data = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            data.extend_from_slice(&[
                (x * 3 + index * 11) as u8,
                (y * 3) as u8,
                (x ^ y ^ index) as u8,
            ]);
        }
    }
    Frame::new(width, height, data).unwrap()
}

fn config() -> RunConfig {
    RunConfig::new("clip.mp4", 4).with_output_dir("out")
}

// ------------------------------------------------------------------------
// Happy path
// ------------------------------------------------------------------------

#[test]
fn test_end_to_end_ten_frames() {
    let mut media = FakeMedia::new((64, 64), 10);
    let mut transform = ScaleTransform::new(4, Filter::Bicubic);
    let mut monitor = CountingMonitor::default();

    let report = {
        let mut controller = PipelineController::new(config(), &mut transform, &mut monitor);
        let report = controller.run(&mut media).unwrap();
        assert_eq!(controller.state().run_state, RunState::Done);
        assert!(!controller.state().cancelled);
        report
    };

    assert_eq!(report.outcome, RunState::Done);
    assert_eq!(report.frames_processed, 10);
    assert_eq!(report.frame_count, 10);
    assert_eq!(report.sr_size, (256, 256));
    assert_eq!(report.compare_size, (522, 308));

    let sr = media.sink(0);
    assert_eq!(sr.path, PathBuf::from("out/sr_4x_clip.mp4"));
    assert_eq!(sr.frames.len(), 10);
    assert!(sr.frames.iter().all(|f| f.size() == (256, 256)));
    assert_eq!(sr.closes, 1);
    drop(sr);

    let compare = media.sink(1);
    assert_eq!(compare.path, PathBuf::from("out/compare_4x_clip.mp4"));
    assert_eq!(compare.frames.len(), 10);
    assert!(compare.frames.iter().all(|f| f.size() == (522, 308)));
    assert_eq!(compare.closes, 1);
    drop(compare);

    let log = media.log.borrow();
    assert_eq!(log.sources_opened, 1);
    assert_eq!(log.sources_dropped, 1);
    // Headless runs never preview but poll once per frame.
    assert_eq!(monitor.shows, 0);
    assert_eq!(monitor.polls, 10);
}

#[test]
fn test_sr_sink_receives_transform_output_unmodified() {
    let mut media = FakeMedia::new((64, 64), 3);
    let mut transform = ScaleTransform::new(4, Filter::Lanczos);
    let mut monitor = CountingMonitor::default();
    PipelineController::new(config(), &mut transform, &mut monitor)
        .run(&mut media)
        .unwrap();

    let mut expected = ScaleTransform::new(4, Filter::Lanczos);
    let sr = media.sink(0);
    for (i, frame) in sr.frames.iter().enumerate() {
        let want = expected.infer(&pattern_frame((64, 64), i as u32)).unwrap();
        assert_eq!(frame, &want, "frame {}", i);
    }
}

#[test]
fn test_runs_are_deterministic() {
    let run = || {
        let mut media = FakeMedia::new((64, 48), 4);
        let mut transform = ScaleTransform::new(4, Filter::Bicubic);
        let mut monitor = CountingMonitor::default();
        PipelineController::new(config(), &mut transform, &mut monitor)
            .run(&mut media)
            .unwrap();
        let log = media.log.borrow();
        (log.sinks[0].frames.clone(), log.sinks[1].frames.clone())
    };
    let (sr_a, compare_a) = run();
    let (sr_b, compare_b) = run();
    assert_eq!(sr_a, sr_b);
    assert_eq!(compare_a, compare_b);
}

#[test]
fn test_interactive_shows_every_frame() {
    let mut media = FakeMedia::new((64, 64), 5);
    let mut transform = ScaleTransform::new(4, Filter::Bicubic);
    let mut monitor = CountingMonitor::default();
    PipelineController::new(config().with_interactive(true), &mut transform, &mut monitor)
        .run(&mut media)
        .unwrap();
    assert_eq!(monitor.shows, 5);
}

#[test]
fn test_controller_can_run_again() {
    let mut transform = ScaleTransform::new(4, Filter::Bicubic);
    let mut monitor = CountingMonitor::default();
    let mut controller = PipelineController::new(config(), &mut transform, &mut monitor);

    let first = controller.run(&mut FakeMedia::new((64, 64), 2)).unwrap();
    let second = controller.run(&mut FakeMedia::new((64, 64), 3)).unwrap();
    assert_eq!(first.frames_processed, 2);
    assert_eq!(second.frames_processed, 3);
    assert_eq!(controller.state().frames_processed, 3);
}

// ------------------------------------------------------------------------
// Cancellation
// ------------------------------------------------------------------------

#[test]
fn test_cancel_after_k_frames() {
    let mut media = FakeMedia::new((64, 64), 10);
    let mut transform = ScaleTransform::new(4, Filter::Bicubic);
    let mut monitor = CountingMonitor {
        cancel_after: Some(3),
        ..Default::default()
    };

    let report = PipelineController::new(config(), &mut transform, &mut monitor)
        .run(&mut media)
        .unwrap();
    assert_eq!(report.outcome, RunState::Cancelled);
    assert_eq!(report.frames_processed, 3);

    let log = media.log.borrow();
    for sink in &log.sinks {
        assert_eq!(sink.frames.len(), 3);
        assert_eq!(sink.closes, 1);
    }
    assert_eq!(log.sources_dropped, 1);
}

#[test]
fn test_cancel_token_monitor() {
    let mut media = FakeMedia::new((64, 64), 10);
    let mut transform = ScaleTransform::new(4, Filter::Bicubic);
    let mut token = tokio_util::sync::CancellationToken::new();
    token.cancel();

    let report = PipelineController::new(config(), &mut transform, &mut token)
        .run(&mut media)
        .unwrap();
    // The token is observed only after a frame is fully written.
    assert_eq!(report.outcome, RunState::Cancelled);
    assert_eq!(report.frames_processed, 1);
}

// ------------------------------------------------------------------------
// Failures while running
// ------------------------------------------------------------------------

#[test]
fn test_transform_failure_closes_sinks() {
    let mut media = FakeMedia::new((64, 64), 10);
    let mut transform = FailingTransform {
        inner: ScaleTransform::new(4, Filter::Bicubic),
        calls: 0,
        fail_at: 4,
    };
    let mut monitor = CountingMonitor::default();

    let mut controller = PipelineController::new(config(), &mut transform, &mut monitor);
    let err = controller.run(&mut media).unwrap_err();
    assert!(matches!(err, PipelineError::Transform { frame: 4, .. }), "{}", err);
    assert_eq!(controller.state().run_state, RunState::Failed);
    assert_eq!(controller.state().frames_processed, 3);

    let log = media.log.borrow();
    for sink in &log.sinks {
        assert_eq!(sink.frames.len(), 3);
        assert_eq!(sink.closes, 1);
    }
    assert_eq!(log.sources_dropped, 1);
}

#[test]
fn test_read_failure_is_read_error() {
    let mut media = FakeMedia::new((64, 64), 10);
    media.fail_read_at = Some(2);
    let mut transform = ScaleTransform::new(4, Filter::Bicubic);
    let mut monitor = CountingMonitor::default();

    let err = PipelineController::new(config(), &mut transform, &mut monitor)
        .run(&mut media)
        .unwrap_err();
    assert!(matches!(err, PipelineError::Read { frame: 2, .. }), "{}", err);
    assert_eq!(media.sink(0).frames.len(), 1);
    assert_eq!(media.sink(1).closes, 1);
}

#[test]
fn test_compare_write_failure_closes_both_sinks() {
    let mut media = FakeMedia::new((64, 64), 10);
    media.fail_write_at = Some((1, 3));
    let mut transform = ScaleTransform::new(4, Filter::Bicubic);
    let mut monitor = CountingMonitor::default();

    let mut controller = PipelineController::new(config(), &mut transform, &mut monitor);
    let err = controller.run(&mut media).unwrap_err();
    assert!(
        matches!(
            err,
            PipelineError::Write {
                frame: 3,
                target: "compare sink",
                ..
            }
        ),
        "{}",
        err
    );
    assert!(err.to_string().contains("encoder error"), "{}", err);
    assert_eq!(controller.state().run_state, RunState::Failed);
    assert_eq!(controller.state().frames_processed, 2);

    // The sr sink already took frame 3 when the compare write failed.
    assert_eq!(media.sink(0).frames.len(), 3);
    assert_eq!(media.sink(1).frames.len(), 2);
    let log = media.log.borrow();
    assert!(log.sinks.iter().all(|s| s.closes == 1));
    assert_eq!(log.sources_dropped, 1);
}

#[test]
fn test_close_failure_after_last_frame_fails_run() {
    let mut media = FakeMedia::new((64, 64), 4);
    media.fail_close = Some(0);
    let mut transform = ScaleTransform::new(4, Filter::Bicubic);
    let mut monitor = CountingMonitor::default();

    let mut controller = PipelineController::new(config(), &mut transform, &mut monitor);
    let err = controller.run(&mut media).unwrap_err();
    assert!(
        matches!(err, PipelineError::Close { target: "sr sink", .. }),
        "{}",
        err
    );
    assert_eq!(controller.state().run_state, RunState::Failed);
    assert_eq!(controller.state().frames_processed, 4);

    // The compare sink is still finalized after the sr sink fails to close.
    let log = media.log.borrow();
    assert!(log.sinks.iter().all(|s| s.closes == 1 && s.frames.len() == 4));
}

#[test]
fn test_close_failure_while_unwinding_keeps_original_error() {
    let mut media = FakeMedia::new((64, 64), 10);
    media.fail_close = Some(1);
    let mut transform = FailingTransform {
        inner: ScaleTransform::new(4, Filter::Bicubic),
        calls: 0,
        fail_at: 4,
    };
    let mut monitor = CountingMonitor::default();

    let mut controller = PipelineController::new(config(), &mut transform, &mut monitor);
    let err = controller.run(&mut media).unwrap_err();
    assert!(matches!(err, PipelineError::Transform { frame: 4, .. }), "{}", err);
    assert_eq!(controller.state().run_state, RunState::Failed);

    let log = media.log.borrow();
    assert!(log.sinks.iter().all(|s| s.closes == 1 && s.frames.len() == 3));
}

#[test]
fn test_wrong_transform_size_is_shape_error() {
    let mut media = FakeMedia::new((64, 64), 3);
    let mut transform = CroppingTransform;
    let mut monitor = CountingMonitor::default();

    let err = PipelineController::new(config(), &mut transform, &mut monitor)
        .run(&mut media)
        .unwrap_err();
    match err {
        PipelineError::Shape {
            expected, actual, ..
        } => {
            assert_eq!(expected, (256, 256));
            assert_eq!(actual, (255, 256));
        }
        other => panic!("expected shape error, got {}", other),
    }
    let log = media.log.borrow();
    assert!(log.sinks.iter().all(|s| s.frames.is_empty() && s.closes == 1));
}

// ------------------------------------------------------------------------
// Init failures
// ------------------------------------------------------------------------

#[test]
fn test_small_frame_fails_before_sinks_open() {
    // 12 * 4 = 48 leaves a detail tile of 48 / 5 - 9 = 0
    let mut media = FakeMedia::new((12, 12), 5);
    let mut transform = ScaleTransform::new(4, Filter::Bicubic);
    let mut monitor = CountingMonitor::default();

    let mut controller = PipelineController::new(config(), &mut transform, &mut monitor);
    let err = controller.run(&mut media).unwrap_err();
    assert!(err.is_stream_open(), "{}", err);
    assert_eq!(controller.state().run_state, RunState::Failed);

    let log = media.log.borrow();
    assert!(log.sinks.is_empty());
    assert_eq!(log.sources_dropped, 1);
}

#[test]
fn test_factor_mismatch_fails_at_init() {
    let mut media = FakeMedia::new((64, 64), 5);
    let mut transform = ScaleTransform::new(2, Filter::Bicubic);
    let mut monitor = CountingMonitor::default();

    let err = PipelineController::new(config(), &mut transform, &mut monitor)
        .run(&mut media)
        .unwrap_err();
    assert!(err.is_stream_open());
    assert!(media.log.borrow().sinks.is_empty());
}

#[test]
fn test_h264_rejects_odd_compare_size() {
    // 160x90 at 4x gives a 1290x489 comparison frame.
    let mut media = FakeMedia::new((160, 90), 3);
    let mut transform = ScaleTransform::new(4, Filter::Bicubic);
    let mut monitor = CountingMonitor::default();

    let mut controller = PipelineController::new(
        config().with_codec(VideoCodec::H264),
        &mut transform,
        &mut monitor,
    );
    let err = controller.run(&mut media).unwrap_err();
    assert!(err.is_stream_open(), "{}", err);
    assert!(err.to_string().contains("1290x489"), "{}", err);
    assert_eq!(controller.state().run_state, RunState::Failed);

    let log = media.log.borrow();
    assert!(log.sinks.is_empty());
    assert_eq!(log.sources_dropped, 1);
}

#[test]
fn test_h264_accepts_even_sizes() {
    let mut media = FakeMedia::new((64, 64), 2);
    let mut transform = ScaleTransform::new(4, Filter::Bicubic);
    let mut monitor = CountingMonitor::default();

    let report = PipelineController::new(
        config().with_codec(VideoCodec::H264),
        &mut transform,
        &mut monitor,
    )
    .run(&mut media)
    .unwrap();
    assert_eq!(report.outcome, RunState::Done);
    assert_eq!(report.compare_size, (522, 308));
}

#[test]
fn test_compare_sink_open_failure_releases_sr_sink() {
    let mut media = FakeMedia::new((64, 64), 5);
    media.fail_sink_open = Some(1);
    let mut transform = ScaleTransform::new(4, Filter::Bicubic);
    let mut monitor = CountingMonitor::default();

    let err = PipelineController::new(config(), &mut transform, &mut monitor)
        .run(&mut media)
        .unwrap_err();
    assert!(err.is_stream_open());
    assert!(err.to_string().contains("disk full"), "{}", err);

    let log = media.log.borrow();
    assert_eq!(log.sinks.len(), 1);
    assert_eq!(log.sinks[0].closes, 1);
    assert!(log.sinks[0].frames.is_empty());
    assert_eq!(log.sources_dropped, 1);
    assert_eq!(monitor.polls, 0);
}

// ------------------------------------------------------------------------
// Real files
// ------------------------------------------------------------------------

#[test]
fn test_ffmpeg_end_to_end() -> anyhow::Result<()> {
    ffmpeg_io::init()?;
    let dir = std::env::temp_dir().join(format!("sr-compare-e2e-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir)?;

    let source = dir.join("clip.mp4");
    let mut sink = ffmpeg_io::VideoSink::open(&source, (64, 64), 25.0, VideoCodec::Mpeg4)?;
    for i in 0..10 {
        sink.write(&pattern_frame((64, 64), i))?;
    }
    sink.close()?;

    let mut transform = ScaleTransform::new(4, Filter::Bicubic);
    let mut monitor = CountingMonitor::default();
    let config = RunConfig::new(&source, 4).with_output_dir(&dir);
    let report = PipelineController::new(config, &mut transform, &mut monitor).run(&mut FfmpegMedia)?;
    assert_eq!(report.outcome, RunState::Done);
    assert_eq!(report.frames_processed, 10);

    let sr = ffmpeg_io::probe(&report.sr_path)?;
    let sr_video = sr.first_video().expect("video stream");
    assert_eq!(sr_video.size, Some((256, 256)));
    assert_eq!(ffmpeg_io::count_video_packets(&report.sr_path)?, 10);

    let compare = ffmpeg_io::probe(&report.compare_path)?;
    let compare_video = compare.first_video().expect("video stream");
    assert_eq!(compare_video.size, Some((522, 308)));
    assert_eq!(ffmpeg_io::count_video_packets(&report.compare_path)?, 10);
    Ok(())
}
