use clap::{Parser, Subcommand};

pub(crate) const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_SHA"),
    ", ",
    env!("BUILD_DATE"),
    ")"
);

/// Demo stream submitted when `play` is given no locator.
pub(crate) const DEMO_STREAM: &str =
    "https://upload.wikimedia.org/wikipedia/commons/e/ed/The_49th_Street_Galleria_-_Chris_Zabriskie.ogg";

/// Fixed refusal shown for the skip control.
pub(crate) const SKIP_NOTICE: &str = "skip is not supported";

#[derive(Parser, Debug)]
#[command(name = "playdeck", version = VERSION)]
pub(crate) struct Args {
    /// Base URL of the session host, e.g. http://192.168.1.20:5800
    /// (skips mDNS resolution)
    #[arg(long)]
    pub(crate) server: Option<String>,

    /// Resolve the session host by its advertised instance name
    #[arg(long)]
    pub(crate) instance: Option<String>,

    /// Client identifier sent when requesting a session
    #[arg(long, default_value = "playdeck-cli")]
    pub(crate) client_id: String,

    #[command(subcommand)]
    pub(crate) cmd: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Submit one item for playback
    Play {
        /// Item locator (URL or file path); doubles as the item id
        #[arg(default_value = DEMO_STREAM)]
        locator: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        artist: Option<String>,

        #[arg(long)]
        album: Option<String>,
    },
    /// Pause active playback
    Pause,
    /// Skip to the next item (not supported)
    Skip,
    /// Print the session host's status snapshot
    Status,
    /// Probe a locator's tags without playing it
    Probe { locator: String },
    /// Interactive shell with play/pause/skip controls
    Ui,
}
