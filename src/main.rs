use clap::Parser;

mod cli;
mod compare;
mod config;
mod error;
mod evaluate;
mod pipeline;
mod report;

/// Info by default; `directives` (RUST_LOG syntax) are applied last so they win.
fn logging_builder(directives: Option<&str>) -> env_logger::Builder {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(log::LevelFilter::Info);
    if let Some(directives) = directives {
        builder.parse_filters(directives);
    }
    builder
}

fn init_logging() {
    let directives = std::env::var("RUST_LOG").ok();
    logging_builder(directives.as_deref()).init();
}

#[tokio::main]
async fn main() -> ! {
    let cli = cli::Cli::parse();
    init_logging();
    ffmpeg_io::init().unwrap_or_else(|e| {
        eprintln!("Error initializing ffmpeg: {:#}", e);
        std::process::exit(1);
    });

    let code = match cli::run(cli).await {
        Ok(()) => 0,
        Err(e) => {
            log::error!("{:#}", e);
            1
        }
    };

    std::process::exit(code);
}
