//! Playback worker with an explicit player lifecycle.
//!
//! The worker owns one engine session at a time and drives it through the
//! phases `Idle -> Preparing -> Prepared -> Playing -> Paused`. Prepare runs
//! asynchronously on the session thread; output starts only once prepare has
//! finished. A failed track releases its session and returns the player to
//! `Idle` while the worker keeps serving commands.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Result, bail};
use cpal::traits::DeviceTrait;
use crossbeam_channel::{Receiver, Sender};

use playdeck_engine::config::EngineConfig;
use playdeck_engine::status::StatusState;
use playdeck_engine::{decode, device, pipeline, source};
use playdeck_types::{PlaybackEndReason, PlayerPhase};

use crate::controls::{self, ControlsHandle, ControlsUpdate};

/// Commands accepted by the playback worker.
#[derive(Debug, Clone)]
pub(crate) enum PlayerCommand {
    /// Release the current track, if any, and play `url`.
    Play { url: String },
    /// Pause the playing track; no-op in any other phase.
    Pause,
    /// Resume a paused track (arrives from the OS media controls).
    Resume,
    /// Play/pause toggle from the OS media controls.
    Toggle,
    /// Tear down and exit the worker thread.
    Quit,
}

/// Lifecycle events that move the player between phases.
#[derive(Debug, Clone, Copy)]
enum PhaseEvent {
    PlayRequested,
    PrepareFinished,
    OutputStarted,
    PauseRequested,
    ResumeRequested,
    Released,
}

/// The phase machine. `None` means the event does not apply in `phase` and
/// must be ignored. Output can start only from `Prepared`; a resume
/// un-silences output that already started, it never starts new output.
fn next_phase(phase: PlayerPhase, event: PhaseEvent) -> Option<PlayerPhase> {
    use PlayerPhase::*;
    match (phase, event) {
        (_, PhaseEvent::PlayRequested) => Some(Preparing),
        (Preparing, PhaseEvent::PrepareFinished) => Some(Prepared),
        (Prepared, PhaseEvent::OutputStarted) => Some(Playing),
        (Playing, PhaseEvent::PauseRequested) => Some(Paused),
        (Paused, PhaseEvent::ResumeRequested) => Some(Playing),
        (_, PhaseEvent::Released) => Some(Idle),
        _ => None,
    }
}

/// Apply `event` to the shared phase. Returns whether the phase moved.
fn apply_phase_event(status: &Arc<Mutex<StatusState>>, event: PhaseEvent) -> bool {
    let Ok(mut st) = status.lock() else {
        return false;
    };
    let current = st.phase.unwrap_or_default();
    match next_phase(current, event) {
        Some(next) => {
            st.phase = Some(next);
            true
        }
        None => {
            tracing::debug!(current = ?current, event = ?event, "phase event ignored");
            false
        }
    }
}

fn current_phase(status: &Arc<Mutex<StatusState>>) -> PlayerPhase {
    status
        .lock()
        .map(|st| st.phase.unwrap_or_default())
        .unwrap_or_default()
}

/// Handle for sending commands to the playback worker.
#[derive(Clone)]
pub(crate) struct PlayerHandle {
    pub(crate) cmd_tx: Sender<PlayerCommand>,
}

struct SessionHandle {
    cancel: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    join: std::thread::JoinHandle<()>,
}

/// Spawn the playback worker thread.
pub(crate) fn spawn_player(
    engine: EngineConfig,
    device_name: Option<String>,
    status: Arc<Mutex<StatusState>>,
) -> (PlayerHandle, std::thread::JoinHandle<()>) {
    let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded();
    let events_tx = cmd_tx.clone();
    let join =
        std::thread::spawn(move || player_thread_main(engine, device_name, status, events_tx, cmd_rx));
    (PlayerHandle { cmd_tx }, join)
}

/// Main command loop. Survives playback errors; only `Quit` or a dropped
/// channel ends it.
fn player_thread_main(
    engine: EngineConfig,
    device_name: Option<String>,
    status: Arc<Mutex<StatusState>>,
    events_tx: Sender<PlayerCommand>,
    cmd_rx: Receiver<PlayerCommand>,
) {
    let controls = controls::spawn_media_controls(events_tx);
    if let Ok(mut st) = status.lock() {
        st.phase = Some(PlayerPhase::Idle);
    }
    let mut session: Option<SessionHandle> = None;

    while let Ok(cmd) = cmd_rx.recv() {
        match cmd {
            PlayerCommand::Quit => {
                release_session(&mut session);
                controls.set(ControlsUpdate::Stopped);
                break;
            }
            PlayerCommand::Play { url } => {
                tracing::info!(url = %url, "play_song received");
                release_session(&mut session);
                start_session(&engine, &device_name, &status, &controls, &mut session, url);
            }
            PlayerCommand::Pause => pause_active(&status, &controls, session.as_ref()),
            PlayerCommand::Resume => resume_active(&status, &controls, session.as_ref()),
            PlayerCommand::Toggle => match current_phase(&status) {
                PlayerPhase::Playing => pause_active(&status, &controls, session.as_ref()),
                PlayerPhase::Paused => resume_active(&status, &controls, session.as_ref()),
                phase => tracing::debug!(phase = ?phase, "toggle ignored"),
            },
        }
    }
    release_session(&mut session);
    tracing::info!("player worker exited");
}

fn pause_active(
    status: &Arc<Mutex<StatusState>>,
    controls: &ControlsHandle,
    session: Option<&SessionHandle>,
) {
    let Some(sess) = session else {
        tracing::debug!("pause with no active track");
        return;
    };
    if apply_phase_event(status, PhaseEvent::PauseRequested) {
        sess.paused.store(true, Ordering::Relaxed);
        controls.set(ControlsUpdate::Paused);
        tracing::info!("paused");
    }
}

fn resume_active(
    status: &Arc<Mutex<StatusState>>,
    controls: &ControlsHandle,
    session: Option<&SessionHandle>,
) {
    let Some(sess) = session else {
        tracing::debug!("resume with no active track");
        return;
    };
    if apply_phase_event(status, PhaseEvent::ResumeRequested) {
        sess.paused.store(false, Ordering::Relaxed);
        controls.set(ControlsUpdate::Playing);
        tracing::info!("resumed");
    }
}

/// Release the active track and join its session thread. The pause flag is
/// raised before the cancel flag so the device goes quiet first.
fn release_session(session: &mut Option<SessionHandle>) {
    if let Some(sess) = session.take() {
        sess.paused.store(true, Ordering::Relaxed);
        sess.cancel.store(true, Ordering::Release);
        let _ = sess.join.join();
    }
}

fn start_session(
    engine: &EngineConfig,
    device_name: &Option<String>,
    status: &Arc<Mutex<StatusState>>,
    controls: &ControlsHandle,
    session: &mut Option<SessionHandle>,
    url: String,
) {
    apply_phase_event(status, PhaseEvent::PlayRequested);
    if let Ok(mut st) = status.lock() {
        st.clear_playback();
        st.end_reason = None;
        st.now_playing_id = Some(url.clone());
        st.now_playing = Some(url.clone());
    }

    let cancel = Arc::new(AtomicBool::new(false));
    let paused = Arc::new(AtomicBool::new(false));

    let engine = engine.clone();
    let device_name = device_name.clone();
    let status = status.clone();
    let controls = controls.clone();
    let cancel_for_thread = cancel.clone();
    let paused_for_thread = paused.clone();

    let join = std::thread::spawn(move || {
        match play_session(
            &engine,
            device_name.as_deref(),
            &status,
            &controls,
            &url,
            &cancel_for_thread,
            &paused_for_thread,
        ) {
            Ok(reason) => finish_session(&status, &controls, reason),
            Err(e) => {
                tracing::warn!(url = %url, "playback error: {e:#}");
                finish_session(&status, &controls, PlaybackEndReason::Error);
            }
        }
    });

    *session = Some(SessionHandle {
        cancel,
        paused,
        join,
    });
}

/// Prepare and render one track. Returns how playback ended.
fn play_session(
    engine: &EngineConfig,
    device_name: Option<&str>,
    status: &Arc<Mutex<StatusState>>,
    controls: &ControlsHandle,
    url: &str,
    cancel: &Arc<AtomicBool>,
    paused: &Arc<AtomicBool>,
) -> Result<PlaybackEndReason> {
    let (media, hint) = source::open_locator(url, Some(cancel.clone()))?;
    let start = decode::spawn_decoder(media, hint, engine.buffer_seconds)?;
    apply_phase_event(status, PhaseEvent::PrepareFinished);
    tracing::info!(url = %url, "prepared");

    let rendered = render_prepared(engine, device_name, status, controls, url, &start, cancel, paused);
    if rendered.is_err() {
        // Unblock the decode thread; the session owns the queue now.
        start.queue.close();
    }
    rendered?;

    if start.failed.load(Ordering::Relaxed) && !cancel.load(Ordering::Acquire) {
        bail!("decode failed mid-stream");
    }
    Ok(if cancel.load(Ordering::Acquire) {
        PlaybackEndReason::Stopped
    } else {
        PlaybackEndReason::Eof
    })
}

#[allow(clippy::too_many_arguments)]
fn render_prepared(
    engine: &EngineConfig,
    device_name: Option<&str>,
    status: &Arc<Mutex<StatusState>>,
    controls: &ControlsHandle,
    url: &str,
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

    if !apply_phase_event(status, PhaseEvent::OutputStarted) {
        bail!("output refused: player is not prepared");
    }
    if let Ok(mut st) = status.lock() {
        st.device = device.description().ok().map(|d| d.to_string());
        st.sample_rate = Some(stream_config.sample_rate);
        st.channels = Some(start.spec.channels.count() as u16);
        st.duration_ms = start.duration_ms;
        st.source_codec = start.details.codec.clone();
        st.container = start.details.container.clone();
        st.played_frames = Some(opts.played_frames.clone());
        st.paused_flag = Some(paused.clone());
    }
    controls.set(ControlsUpdate::Playing);
    tracing::info!(url = %url, "playing");

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

fn finish_session(
    status: &Arc<Mutex<StatusState>>,
    controls: &ControlsHandle,
    reason: PlaybackEndReason,
) {
    if let Ok(mut st) = status.lock() {
        st.clear_playback();
        st.end_reason = Some(reason);
    }
    apply_phase_event(status, PhaseEvent::Released);
    controls.set(ControlsUpdate::Stopped);
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_PHASES: [PlayerPhase; 5] = [
        PlayerPhase::Idle,
        PlayerPhase::Preparing,
        PlayerPhase::Prepared,
        PlayerPhase::Playing,
        PlayerPhase::Paused,
    ];

    #[test]
    fn playing_is_reachable_only_from_prepared() {
        for phase in ALL_PHASES {
            let next = next_phase(phase, PhaseEvent::OutputStarted);
            if phase == PlayerPhase::Prepared {
                assert_eq!(next, Some(PlayerPhase::Playing));
            } else {
                assert_eq!(next, None, "output must not start from {phase:?}");
            }
        }
    }

    #[test]
    fn play_request_always_enters_preparing() {
        for phase in ALL_PHASES {
            assert_eq!(
                next_phase(phase, PhaseEvent::PlayRequested),
                Some(PlayerPhase::Preparing)
            );
        }
    }

    #[test]
    fn prepare_finishes_only_while_preparing() {
        assert_eq!(
            next_phase(PlayerPhase::Preparing, PhaseEvent::PrepareFinished),
            Some(PlayerPhase::Prepared)
        );
        assert_eq!(next_phase(PlayerPhase::Idle, PhaseEvent::PrepareFinished), None);
        assert_eq!(
            next_phase(PlayerPhase::Playing, PhaseEvent::PrepareFinished),
            None
        );
    }

    #[test]
    fn pause_applies_only_while_playing() {
        assert_eq!(
            next_phase(PlayerPhase::Playing, PhaseEvent::PauseRequested),
            Some(PlayerPhase::Paused)
        );
        for phase in [PlayerPhase::Idle, PlayerPhase::Preparing, PlayerPhase::Paused] {
            assert_eq!(next_phase(phase, PhaseEvent::PauseRequested), None);
        }
    }

    #[test]
    fn resume_applies_only_while_paused() {
        assert_eq!(
            next_phase(PlayerPhase::Paused, PhaseEvent::ResumeRequested),
            Some(PlayerPhase::Playing)
        );
        for phase in [PlayerPhase::Idle, PlayerPhase::Prepared, PlayerPhase::Playing] {
            assert_eq!(next_phase(phase, PhaseEvent::ResumeRequested), None);
        }
    }

    #[test]
    fn release_returns_to_idle_from_any_phase() {
        for phase in ALL_PHASES {
            assert_eq!(
                next_phase(phase, PhaseEvent::Released),
                Some(PlayerPhase::Idle)
            );
        }
    }

    #[test]
    fn apply_phase_event_moves_shared_phase() {
        let status = StatusState::shared();
        status.lock().unwrap().phase = Some(PlayerPhase::Prepared);

        assert!(apply_phase_event(&status, PhaseEvent::OutputStarted));
        assert_eq!(current_phase(&status), PlayerPhase::Playing);

        assert!(!apply_phase_event(&status, PhaseEvent::OutputStarted));
        assert_eq!(current_phase(&status), PlayerPhase::Playing);
    }

    #[test]
    fn worker_starts_idle_and_quits_cleanly() {
        let status = StatusState::shared();
        let (handle, join) = spawn_player(EngineConfig::default(), None, status.clone());

        handle.cmd_tx.send(PlayerCommand::Quit).unwrap();
        join.join().unwrap();

        assert_eq!(current_phase(&status), PlayerPhase::Idle);
    }

    #[test]
    fn pause_without_track_changes_nothing() {
        let status = StatusState::shared();
        let (handle, join) = spawn_player(EngineConfig::default(), None, status.clone());

        handle.cmd_tx.send(PlayerCommand::Pause).unwrap();
        handle.cmd_tx.send(PlayerCommand::Quit).unwrap();
        join.join().unwrap();

        let snap = status.lock().unwrap().snapshot();
        assert_eq!(snap.phase, Some(PlayerPhase::Idle));
        assert!(!snap.paused);
        assert!(snap.now_playing.is_none());
        assert!(snap.end_reason.is_none());
    }
}
