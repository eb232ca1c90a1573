//! OS media-controls integration.
//!
//! While a track plays, the daemon publishes a fixed now-playing card to the
//! system media controls and accepts play/pause events back from them. A
//! dedicated thread owns the `MediaControls` handle; attach failures are
//! logged and playback proceeds without the card.

use crossbeam_channel::{Receiver, Sender};
use souvlaki::{MediaControlEvent, MediaControls, MediaMetadata, MediaPlayback, PlatformConfig};

use crate::player::PlayerCommand;

/// Fixed now-playing title shown while a track plays.
pub(crate) const NOTICE_TITLE: &str = "Playing Media";
/// Fixed now-playing text shown while a track plays.
pub(crate) const NOTICE_TEXT: &str = "Artist - Song Title";

/// Media-controls state pushed by the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ControlsUpdate {
    Playing,
    Paused,
    Stopped,
}

/// Handle for pushing state to the media-controls thread.
#[derive(Clone)]
pub(crate) struct ControlsHandle {
    tx: Sender<ControlsUpdate>,
}

impl ControlsHandle {
    pub(crate) fn set(&self, update: ControlsUpdate) {
        let _ = self.tx.send(update);
    }
}

/// Spawn the media-controls thread.
///
/// OS play/pause/toggle events are forwarded to the player through
/// `player_tx`. The thread exits when every `ControlsHandle` is gone.
pub(crate) fn spawn_media_controls(player_tx: Sender<PlayerCommand>) -> ControlsHandle {
    let (tx, rx) = crossbeam_channel::unbounded();
    std::thread::spawn(move || controls_thread_main(player_tx, rx));
    ControlsHandle { tx }
}

fn controls_thread_main(player_tx: Sender<PlayerCommand>, rx: Receiver<ControlsUpdate>) {
    let Some(mut controls) = create_controls(player_tx) else {
        return;
    };
    while let Ok(update) = rx.recv() {
        let result = match update {
            ControlsUpdate::Playing => controls
                .set_metadata(MediaMetadata {
                    title: Some(NOTICE_TITLE),
                    artist: Some(NOTICE_TEXT),
                    ..MediaMetadata::default()
                })
                .and_then(|_| controls.set_playback(MediaPlayback::Playing { progress: None })),
            ControlsUpdate::Paused => controls.set_playback(MediaPlayback::Paused { progress: None }),
            ControlsUpdate::Stopped => controls.set_playback(MediaPlayback::Stopped),
        };
        if let Err(e) = result {
            tracing::debug!(error = ?e, update = ?update, "media controls update failed");
        }
    }
    let _ = controls.detach();
}

fn create_controls(player_tx: Sender<PlayerCommand>) -> Option<MediaControls> {
    let config = PlatformConfig {
        dbus_name: "miniplayer",
        display_name: "Miniplayer",
        hwnd: None,
    };
    let mut controls = match MediaControls::new(config) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(error = ?e, "media controls unavailable");
            return None;
        }
    };
    let attached = controls.attach(move |event| {
        let cmd = match event {
            MediaControlEvent::Play => Some(PlayerCommand::Resume),
            MediaControlEvent::Pause => Some(PlayerCommand::Pause),
            MediaControlEvent::Toggle => Some(PlayerCommand::Toggle),
            _ => None,
        };
        if let Some(cmd) = cmd {
            let _ = player_tx.send(cmd);
        }
    });
    if let Err(e) = attached {
        tracing::warn!(error = ?e, "media controls attach failed");
        return None;
    }
    Some(controls)
}
