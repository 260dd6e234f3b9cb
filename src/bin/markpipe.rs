use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use markpipe::{
    cli::Cli, ClipStore, FfmpegDecoder, MarkerConfig, MarkpipeError, PlaybackController,
    TerminalKeys, TerminalScreen,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn setup_logging(debug: bool) -> Result<()> {
    let env_filter = EnvFilter::from_default_env().add_directive("info".parse()?);
    let env_filter = if debug {
        env_filter.add_directive("markpipe=debug".parse()?)
    } else {
        env_filter
    };

    // the clip dump owns stdout, logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

fn store_path(custom: &Option<String>) -> Result<PathBuf> {
    if let Some(path) = custom {
        return Ok(PathBuf::from(path));
    }
    let base_dir = dirs::home_dir()
        .ok_or_else(|| anyhow::anyhow!("failed to get home directory"))?
        .join(".markpipe");
    std::fs::create_dir_all(&base_dir)?;
    Ok(base_dir.join("markpipe.db"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.debug)?;

    let path = store_path(&cli.db)?;
    let mut store = ClipStore::open(&path.to_string_lossy())?;
    if cli.clobber_store {
        warn!("clobbering clip store at {}", path.display());
        store.clobber()?;
    }

    let decoder = match FfmpegDecoder::open(&cli.video) {
        Ok(decoder) => decoder,
        Err(err @ MarkpipeError::VideoOpen { .. }) => {
            eprintln!("{}", err.to_string().red());
            std::process::exit(1);
        }
        Err(err) => return Err(err.into()),
    };

    let config = MarkerConfig::new(
        Duration::from_secs_f64(cli.pre_roll.max(0.0)),
        Duration::from_secs_f64(cli.post_roll.max(0.0)),
    );

    let screen = TerminalScreen::new()?;
    let mut controller = PlaybackController::new(decoder, screen, TerminalKeys, &store, config);
    let reason = controller.run(&cli.event)?;
    // releases the terminal before anything is written to stdout
    drop(controller);

    info!("playback stopped: {:?}", reason);

    // dump the store to stdout, one clip per line
    for clip in store.load_all()? {
        println!("{} {} {}", clip.event, clip.start, clip.end);
    }

    Ok(())
}
