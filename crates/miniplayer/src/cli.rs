use std::net::SocketAddr;

use clap::Parser;

pub(crate) const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_SHA"),
    ", ",
    env!("BUILD_DATE"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "miniplayer", version = VERSION)]
pub(crate) struct Args {
    /// List output devices and exit
    #[arg(long)]
    pub(crate) list_devices: bool,

    /// Use a specific output device by substring match
    #[arg(long)]
    pub(crate) device: Option<String>,

    /// Resampler input chunk size in frames
    #[arg(long, default_value_t = 1024)]
    pub(crate) chunk_frames: usize,

    /// Playback callback refill cap (frames)
    #[arg(long, default_value_t = 4096)]
    pub(crate) refill_max_frames: usize,

    /// Queue buffer target in seconds (per stage)
    #[arg(long, default_value_t = 2.0)]
    pub(crate) buffer_seconds: f32,

    /// HTTP bind address, e.g. 0.0.0.0:5810
    #[arg(long, default_value = "0.0.0.0:5810")]
    pub(crate) http_bind: SocketAddr,
}
