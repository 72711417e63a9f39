use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::error::ErrorKind;
use clap::Parser;

use tc_media::{DecoderOptions, MediaDecoder};

mod cli;
mod control;
mod pipeline;
mod stats;

use pipeline::{Pipeline, PipelineConfig, PipelineShared};

fn main() -> ExitCode {
    // 1. CLI. Help and version exit 0, anything invalid exits 1 with
    //    usage on stderr.
    let cli = match cli::Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(1),
            };
        }
    };

    // 2. Logging.
    env_logger::Builder::new()
        .filter_level(cli.log_level.parse().unwrap_or(log::LevelFilter::Warn))
        .init();

    // 3. Run. Init failures are fatal; everything downstream degrades.
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("termcine: {err:#}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: &cli::Cli) -> Result<()> {
    let decoder = Arc::new(MediaDecoder::open(DecoderOptions {
        url: cli.input.clone(),
        enable_audio: !cli.no_audio,
    })?);

    let shared = Arc::new(PipelineShared::new());

    // SIGINT/SIGTERM request the same cooperative shutdown as 'q'.
    {
        let shared = Arc::clone(&shared);
        let decoder = Arc::clone(&decoder);
        ctrlc::set_handler(move || {
            shared.request_stop();
            decoder.stop();
        })?;
    }

    let config = PipelineConfig {
        renderer: cli.renderer_config(),
        target_fps: cli.fps.unwrap_or(0.0),
        volume: f32::from(cli.volume) / 100.0,
        show_stats: cli.stats,
        max_write_mbps: cli.maxwrite,
        export: cli.export_config(),
    };

    Pipeline::new(decoder, shared, config).run()
}
