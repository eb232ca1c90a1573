//! Playback worker.
//!
//! One thread owns the engine. HTTP handlers talk to it through a command
//! channel; each submitted batch plays on its own session thread carrying
//! `cancel`/`paused` flags, advancing through the queue on end-of-stream.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Result, bail};
use cpal::traits::DeviceTrait;
use crossbeam_channel::{Receiver, Sender};

use playdeck_engine::config::EngineConfig;
use playdeck_engine::status::StatusState;
use playdeck_engine::{decode, device, pipeline, source};
use playdeck_types::{PlayableItem, PlaybackEndReason, PlayerPhase};

/// Commands accepted by the playback worker.
#[derive(Debug)]
pub(crate) enum PlayerCommand {
    /// Replace whatever is playing with a freshly resolved queue.
    PlayBatch { items: Vec<ResolvedTrack> },
    /// Pause the active session; no-op when nothing is playing.
    Pause,
    /// Cancel the active session and go idle.
    Stop,
    /// Tear down and exit the worker thread.
    Quit,
}

/// A playable item reduced to what the engine needs: stable id plus the
/// locator chosen at intake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResolvedTrack {
    pub(crate) id: String,
    pub(crate) locator: String,
}

/// Resolve a submitted batch into engine-ready tracks.
///
/// Each item's fetch locator is fixed here, at intake: the explicit `locator`
/// when present, otherwise the `id` itself. Rejects empty batches and items
/// that resolve to an empty locator.
pub(crate) fn resolve_batch(items: Vec<PlayableItem>) -> Result<Vec<ResolvedTrack>> {
    if items.is_empty() {
        bail!("empty batch");
    }
    let mut resolved = Vec::with_capacity(items.len());
    for (idx, item) in items.into_iter().enumerate() {
        let locator = item.effective_locator().to_string();
        if locator.trim().is_empty() {
            bail!("item {idx} has neither id nor locator");
        }
        resolved.push(ResolvedTrack {
            id: item.id,
            locator,
        });
    }
    Ok(resolved)
}

/// Handle for sending commands to the playback worker.
#[derive(Clone)]
pub(crate) struct PlayerHandle {
    pub(crate) cmd_tx: Sender<PlayerCommand>,
}

struct SessionHandle {
    paused: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
    join: std::thread::JoinHandle<()>,
}

/// Spawn the playback worker thread.
///
/// The join handle is kept so teardown can wait for the worker to finish
/// releasing the engine.
pub(crate) fn spawn_player_worker(
    engine: EngineConfig,
    device_name: Option<String>,
    status: Arc<Mutex<StatusState>>,
) -> (PlayerHandle, std::thread::JoinHandle<()>) {
    let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded();
    let join = std::thread::spawn(move || player_thread_main(engine, device_name, status, cmd_rx));
    (PlayerHandle { cmd_tx }, join)
}

/// Main command loop. Survives playback errors; only `Quit` or a dropped
/// channel ends it.
fn player_thread_main(
    engine: EngineConfig,
    device_name: Option<String>,
    status: Arc<Mutex<StatusState>>,
    cmd_rx: Receiver<PlayerCommand>,
) {
    let mut session: Option<SessionHandle> = None;

    while let Ok(cmd) = cmd_rx.recv() {
        match cmd {
            PlayerCommand::Quit => {
                teardown_session(&mut session);
                break;
            }
            PlayerCommand::Stop => {
                teardown_session(&mut session);
            }
            PlayerCommand::Pause => {
                if let Some(sess) = session.as_ref() {
                    sess.paused.store(true, Ordering::Relaxed);
                    tracing::info!("playback paused");
                } else {
                    tracing::debug!("pause with nothing submitted; state unchanged");
                }
            }
            PlayerCommand::PlayBatch { items } => {
                start_batch_session(&engine, &device_name, &status, &mut session, items);
            }
        }
    }
    teardown_session(&mut session);
    tracing::info!("playback worker exited");
}

/// Stop the active session and join its thread.
///
/// The pause flag is raised before the cancel flag so the device goes silent
/// before the session is torn down; the loads in session threads pair with
/// the release store on `cancel`.
fn teardown_session(session: &mut Option<SessionHandle>) {
    if let Some(sess) = session.take() {
        sess.paused.store(true, Ordering::Relaxed);
        sess.cancel.store(true, Ordering::Release);
        let _ = sess.join.join();
    }
}

fn start_batch_session(
    engine: &EngineConfig,
    device_name: &Option<String>,
    status: &Arc<Mutex<StatusState>>,
    session: &mut Option<SessionHandle>,
    items: Vec<ResolvedTrack>,
) {
    teardown_session(session);

    let cancel = Arc::new(AtomicBool::new(false));
    let paused = Arc::new(AtomicBool::new(false));

    let engine = engine.clone();
    let device_name = device_name.clone();
    let status = status.clone();
    let cancel_for_thread = cancel.clone();
    let paused_for_thread = paused.clone();

    let join = std::thread::spawn(move || {
        run_batch(
            engine,
            device_name,
            status,
            items,
            cancel_for_thread,
            paused_for_thread,
        );
    });

    *session = Some(SessionHandle {
        paused,
        cancel,
        join,
    });
}

/// Play the queue in order on one session thread.
///
/// A failed item logs, marks the end reason, and advances to the next; the
/// whole batch reports `eof` after a natural finish and `stopped` after a
/// cancel.
fn run_batch(
    engine: EngineConfig,
    device_name: Option<String>,
    status: Arc<Mutex<StatusState>>,
    items: Vec<ResolvedTrack>,
    cancel: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
) {
    let total = items.len();
    let mut reason = PlaybackEndReason::Eof;

    for (index, track) in items.into_iter().enumerate() {
        if cancel.load(Ordering::Acquire) {
            reason = PlaybackEndReason::Stopped;
            break;
        }
        match play_one_item(
            &engine,
            device_name.as_deref(),
            &status,
            &track,
            index,
            total,
            &cancel,
            &paused,
        ) {
            Ok(()) => {
                reason = if cancel.load(Ordering::Acquire) {
                    PlaybackEndReason::Stopped
                } else {
                    PlaybackEndReason::Eof
                };
            }
            Err(e) => {
                tracing::warn!(id = %track.id, "playback error: {e:#}");
                reason = PlaybackEndReason::Error;
            }
        }
    }

    let mut st = status.lock().unwrap();
    st.clear_playback();
    st.phase = Some(PlayerPhase::Idle);
    st.end_reason = Some(reason);
}

/// Decode and render one track, updating the shared status along the way.
#[allow(clippy::too_many_arguments)]
fn play_one_item(
    engine: &EngineConfig,
    device_name: Option<&str>,
    status: &Arc<Mutex<StatusState>>,
    track: &ResolvedTrack,
    index: usize,
    total: usize,
    cancel: &Arc<AtomicBool>,
    paused: &Arc<AtomicBool>,
) -> Result<()> {
    {
        let mut st = status.lock().unwrap();
        st.clear_playback();
        st.now_playing_id = Some(track.id.clone());
        st.now_playing = Some(track.locator.clone());
        st.phase = Some(PlayerPhase::Preparing);
        st.queue_len = Some(total as u32);
        st.queue_position = Some(index as u32);
        st.end_reason = None;
    }

    let (media, hint) = source::open_locator(&track.locator, Some(cancel.clone()))?;
    let start = decode::spawn_decoder(media, hint, engine.buffer_seconds)?;

    let rendered = render_item(
        engine,
        device_name,
        status,
        track,
        index,
        total,
        &start,
        cancel,
        paused,
    );
    if rendered.is_err() {
        // Unblock the decode thread; nothing will drain the queue now.
        start.queue.close();
    }
    rendered?;

    // A decode failure surfaces here once the queue drains; a cancelled
    // session trips the same flag by closing the source underneath it.
    if start.failed.load(Ordering::Relaxed) && !cancel.load(Ordering::Acquire) {
        bail!("decode failed mid-stream");
    }
    Ok(())
}

/// Pick an output, publish the playing status, and render the decoded stream.
#[allow(clippy::too_many_arguments)]
fn render_item(
    engine: &EngineConfig,
    device_name: Option<&str>,
    status: &Arc<Mutex<StatusState>>,
    track: &ResolvedTrack,
    index: usize,
    total: usize,
    start: &decode::DecodeStart,
    cancel: &Arc<AtomicBool>,
    paused: &Arc<AtomicBool>,
) -> Result<()> {
    let host = cpal::default_host();
    let device = device::pick_device(&host, device_name)?;
    let config = device::pick_output_config(&device, Some(start.spec.rate))?;
    let mut stream_config: cpal::StreamConfig = config.clone().into();
    if let Some(buf) = device::pick_buffer_size(&config) {
        stream_config.buffer_size = buf;
    }

    let opts = pipeline::RenderOptions {
        paused: paused.clone(),
        cancel: cancel.clone(),
        ..pipeline::RenderOptions::new()
    };

    {
        let mut st = status.lock().unwrap();
        st.device = device.description().ok().map(|d| d.to_string());
        st.sample_rate = Some(stream_config.sample_rate);
        st.channels = Some(start.spec.channels.count() as u16);
        st.duration_ms = start.duration_ms;
        st.source_codec = start.details.codec.clone();
        st.container = start.details.container.clone();
        st.phase = Some(PlayerPhase::Playing);
        st.played_frames = Some(opts.played_frames.clone());
        st.paused_flag = Some(paused.clone());
    }
    tracing::info!(
        id = %track.id,
        locator = %track.locator,
        position = index + 1,
        total,
        "playback started"
    );

    pipeline::render_to_device(
        &device,
        &config,
        &stream_config,
        engine,
        start.spec,
        start.queue.clone(),
        &opts,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn item(id: &str, locator: Option<&str>) -> PlayableItem {
        PlayableItem {
            id: id.to_string(),
            locator: locator.map(str::to_string),
            ..PlayableItem::default()
        }
    }

    #[test]
    fn resolve_batch_uses_id_as_locator() {
        let out = resolve_batch(vec![item("https://example.org/a.ogg", None)]).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "https://example.org/a.ogg");
        assert_eq!(out[0].locator, "https://example.org/a.ogg");
    }

    #[test]
    fn resolve_batch_prefers_explicit_locator() {
        let out = resolve_batch(vec![item("track-7", Some("/music/seven.flac"))]).unwrap();
        assert_eq!(out[0].id, "track-7");
        assert_eq!(out[0].locator, "/music/seven.flac");
    }

    #[test]
    fn resolve_batch_rejects_empty_batch() {
        assert!(resolve_batch(Vec::new()).is_err());
    }

    #[test]
    fn resolve_batch_rejects_item_without_id_or_locator() {
        let err = resolve_batch(vec![item("", None)]).unwrap_err();
        assert!(err.to_string().contains("item 0"));
    }

    #[test]
    fn resolve_batch_keeps_order() {
        let out = resolve_batch(vec![item("a", None), item("b", None), item("c", None)]).unwrap();
        let ids: Vec<&str> = out.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[test]
    fn teardown_raises_pause_before_cancel() {
        let paused = Arc::new(AtomicBool::new(false));
        let cancel = Arc::new(AtomicBool::new(false));
        let paused_at_cancel = Arc::new(AtomicBool::new(false));

        let paused_in = paused.clone();
        let cancel_in = cancel.clone();
        let seen = paused_at_cancel.clone();
        let join = std::thread::spawn(move || {
            while !cancel_in.load(Ordering::Acquire) {
                std::thread::sleep(Duration::from_millis(1));
            }
            seen.store(paused_in.load(Ordering::Relaxed), Ordering::Relaxed);
        });

        let mut session = Some(SessionHandle {
            paused,
            cancel,
            join,
        });
        teardown_session(&mut session);

        assert!(session.is_none());
        assert!(paused_at_cancel.load(Ordering::Relaxed));
    }

    #[test]
    fn teardown_with_no_session_is_a_no_op() {
        let mut session: Option<SessionHandle> = None;
        teardown_session(&mut session);
        assert!(session.is_none());
    }

    #[test]
    fn pause_with_nothing_submitted_leaves_status_unchanged() {
        let status = StatusState::shared();
        let (handle, join) = spawn_player_worker(EngineConfig::default(), None, status.clone());

        handle.cmd_tx.send(PlayerCommand::Pause).unwrap();
        handle.cmd_tx.send(PlayerCommand::Quit).unwrap();
        join.join().unwrap();

        let snap = status.lock().unwrap().snapshot();
        assert_eq!(snap, playdeck_types::PlayerStatus::default());
    }
}
