pub mod cli;
mod config;
mod db;
mod display;
mod error;
mod playback;
mod video;

pub use config::MarkerConfig;
pub use db::{Clip, ClipStore};
pub use display::{TerminalKeys, TerminalScreen};
pub use error::{MarkpipeError, MarkpipeResult};
pub use playback::{
    Decoder, DisplaySink, Frame, InputSource, Interval, PlaybackController, StopReason,
};
pub use video::FfmpegDecoder;
