use clap::Parser;

#[derive(Parser)]
#[command(author, version, about, long_about = None, name = "markpipe")]
pub struct Cli {
    /// Video source to play
    pub video: String,

    /// Replay only stored clips of this event category (can be specified
    /// multiple times; categories play in the order given)
    #[arg(short, long)]
    pub event: Vec<i64>,

    /// Clip store path. Default to $HOME/.markpipe/markpipe.db
    #[arg(long)]
    pub db: Option<String>,

    /// Seconds of playback kept before a marked moment
    #[arg(long, default_value_t = 2.0)]
    pub pre_roll: f64,

    /// Seconds of playback kept after a marked moment
    #[arg(long, default_value_t = 5.0)]
    pub post_roll: f64,

    /// Wipe every stored clip before playback starts. Destructive!
    #[arg(long, default_value_t = false)]
    pub clobber_store: bool,

    /// Enable debug logging for markpipe modules
    #[arg(long)]
    pub debug: bool,
}
