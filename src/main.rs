use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use bandscope::{
    audio::{select_source, Playback, SourceKind},
    config::{Args, Config},
    logging,
    render::TerminalRenderer,
    scheduler::Scheduler,
    signals,
};

fn main() -> ExitCode {
    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            eprintln!("bandscope: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    // 1. Configuration: file, then command line on top
    let mut config =
        Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    // 2. Logging; the handle flushes the file writer on exit
    let logging = logging::init(&config.log)?;
    info!(version = env!("CARGO_PKG_VERSION"), "bandscope starting");

    // 3. First source in rank order that opens
    let source = select_source(&config.audio).context("No usable audio source")?;
    let kind = source.kind();
    let play = config.audio.play;
    let file = config.audio.file.clone();
    let layout = config.layout.clone();

    // 4. SIGINT/SIGTERM end the run between ticks
    let mut scheduler = Scheduler::new(config, source);
    signals::forward_termination(scheduler.stop_handle())
        .context("Failed to install signal handlers")?;

    // 5. Output surface; stderr logs would draw over it
    let mut renderer = TerminalRenderer::new(&layout)
        .context("Failed to open the terminal")?
        .hold_logs(logging.stderr.clone());

    // 6. Optional audible playback, started alongside the tick clock
    let _playback = match (play, kind, file.as_deref()) {
        (true, SourceKind::File, Some(path)) => Some(Playback::start(path)),
        (true, kind, _) => {
            warn!(?kind, "playback needs the file source, ignoring --play");
            None
        }
        _ => None,
    };

    // 7. Tick until the file ends, the user quits or a signal arrives
    let stats = scheduler.run(&mut renderer)?;
    info!(ticks = stats.ticks, "bandscope exiting");

    Ok(())
}
