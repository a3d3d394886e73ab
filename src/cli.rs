//! Command-line surface. Everything parsed here is turned into a [`RunConfig`]
//! before it reaches the pipeline.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use ffmpeg_io::{Filter, VideoCodec};
use tokio_util::sync::CancellationToken;

use crate::{
    config::config,
    evaluate,
    pipeline::{
        FfmpegMedia, JpegPreview, Monitor, PipelineController, RunConfig, ScaleTransform,
        spawn_quit_listener,
    },
};

#[derive(Parser, Debug)]
#[command(
    name = "sr-compare",
    version,
    about = "Upscale videos frame by frame and build side-by-side comparisons",
    arg_required_else_help = true,
    after_help = "Examples:\n  sr-compare video --file clip.mp4 --upscale-factor 4\n  sr-compare video --file clip.mp4 --view --report run.json\n  sr-compare image --lr lr.png --hr hr.png\n  sr-compare probe clip.mp4"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upscale a video and write the upscaled and comparison videos.
    Video(VideoArgs),
    /// Upscale one image and score it against a high-resolution reference.
    Image(ImageArgs),
    /// Print container and stream metadata.
    Probe {
        path: PathBuf,
    },
}

#[derive(Args, Debug)]
struct VideoArgs {
    /// Source video.
    #[arg(long = "file")]
    file: PathBuf,

    #[arg(long = "upscale-factor")]
    upscale_factor: Option<u32>,

    /// Write a live preview of each comparison frame; type `q` + Enter to stop.
    #[arg(long = "view", default_value_t = false)]
    view: bool,

    #[arg(long = "output-dir", default_value = ".")]
    output_dir: PathBuf,

    /// Four-character code of the output codec, e.g. MPEG, MJPG, H264.
    #[arg(long = "fourcc")]
    fourcc: Option<String>,

    /// Interpolation used by the built-in upscaler.
    #[arg(long = "filter", value_enum, default_value_t = FilterArg::Bicubic)]
    filter: FilterArg,

    /// Write the run summary as JSON.
    #[arg(long = "report")]
    report: Option<PathBuf>,

    /// Preview image path used with --view.
    #[arg(long = "preview")]
    preview: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ImageArgs {
    /// Low-resolution input image.
    #[arg(long = "lr")]
    lr: PathBuf,

    /// High-resolution reference image.
    #[arg(long = "hr")]
    hr: PathBuf,

    #[arg(long = "upscale-factor")]
    upscale_factor: Option<u32>,

    #[arg(long = "filter", value_enum, default_value_t = FilterArg::Bicubic)]
    filter: FilterArg,

    #[arg(short = 'o', long = "output", default_value = "sr.bmp")]
    output: PathBuf,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
enum FilterArg {
    Nearest,
    Bilinear,
    Bicubic,
    Lanczos,
}

impl From<FilterArg> for Filter {
    fn from(value: FilterArg) -> Self {
        match value {
            FilterArg::Nearest => Filter::Point,
            FilterArg::Bilinear => Filter::Bilinear,
            FilterArg::Bicubic => Filter::Bicubic,
            FilterArg::Lanczos => Filter::Lanczos,
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Video(args) => run_video(args).await,
        Command::Image(args) => run_image(args).await,
        Command::Probe { path } => {
            let info = ffmpeg_io::probe(&path)?;
            print!("{}", info);
            Ok(())
        }
    }
}

async fn run_video(args: VideoArgs) -> anyhow::Result<()> {
    let defaults = config();
    let fourcc = args.fourcc.as_deref().unwrap_or(defaults.fourcc());
    let codec = VideoCodec::from_fourcc(fourcc)?;
    let factor = args.upscale_factor.unwrap_or(defaults.upscale_factor());
    let filter = Filter::from(args.filter);
    let run_config = RunConfig::new(args.file, factor)
        .with_interactive(args.view)
        .with_output_dir(args.output_dir)
        .with_codec(codec)
        .with_progress_interval(defaults.progress_interval());

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::info!("interrupt received, stopping after the current frame");
                cancel.cancel();
            }
        });
    }

    let mut monitor: Box<dyn Monitor + Send> = if args.view {
        let preview = args
            .preview
            .unwrap_or_else(|| defaults.preview_path().clone());
        log::info!("preview: {} (type q + Enter to stop)", preview.display());
        spawn_quit_listener(cancel.clone());
        Box::new(JpegPreview::new(preview, defaults.jpeg_quality(), cancel))
    } else {
        Box::new(cancel)
    };

    let report = tokio::task::spawn_blocking(move || {
        let mut transform = ScaleTransform::new(factor, filter);
        let mut controller = PipelineController::new(run_config, &mut transform, monitor.as_mut());
        let result = controller.run(&mut FfmpegMedia);
        let state = controller.state();
        log::debug!(
            "pipeline stopped in {:?} after {} frames",
            state.run_state,
            state.frames_processed
        );
        result
    })
    .await??;

    report.log_summary();
    if let Some(path) = args.report {
        report.write_json(&path)?;
        log::info!("report written to {}", path.display());
    }
    Ok(())
}

async fn run_image(args: ImageArgs) -> anyhow::Result<()> {
    let factor = args.upscale_factor.unwrap_or(config().upscale_factor());
    let filter = Filter::from(args.filter);
    tokio::task::spawn_blocking(move || {
        let mut transform = ScaleTransform::new(factor, filter);
        evaluate::run_image(&args.lr, &args.hr, &mut transform, &args.output)
    })
    .await??;
    Ok(())
}
