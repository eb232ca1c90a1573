use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use playdeck_types::{PlaybackEndReason, PlayerPhase, PlayerStatus};

/// Shared playback status updated by a player worker and read by API layers.
#[derive(Debug, Default)]
pub struct StatusState {
    /// Stable key of the current item.
    pub now_playing_id: Option<String>,
    /// Effective locator of the current item.
    pub now_playing: Option<String>,
    /// Selected output device name.
    pub device: Option<String>,
    /// Output stream sample rate in Hz; elapsed time derives from it.
    pub sample_rate: Option<u32>,
    /// Source channel count.
    pub channels: Option<u16>,
    /// Total duration in milliseconds when known.
    pub duration_ms: Option<u64>,
    /// Source codec label.
    pub source_codec: Option<String>,
    /// Container/extension label.
    pub container: Option<String>,
    /// Lifecycle phase, for daemons that model one.
    pub phase: Option<PlayerPhase>,
    /// Queue length, for hosts that queue.
    pub queue_len: Option<u32>,
    /// Position of the current item in the queue.
    pub queue_position: Option<u32>,
    /// Counter updated by the output callback.
    pub played_frames: Option<Arc<AtomicU64>>,
    /// Pause flag shared with the output callback.
    pub paused_flag: Option<Arc<AtomicBool>>,
    /// Terminal reason from the last run.
    pub end_reason: Option<PlaybackEndReason>,
}

impl StatusState {
    /// Shared, mutex-protected status store.
    pub fn shared() -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self::default()))
    }

    /// Snapshot for API responses.
    pub fn snapshot(&self) -> PlayerStatus {
        let paused = self
            .paused_flag
            .as_ref()
            .map(|p| p.load(Ordering::Relaxed))
            .unwrap_or(false);
        let elapsed_ms = match (self.played_frames.as_ref(), self.sample_rate) {
            (Some(frames), Some(sr)) if sr > 0 => {
                let frames = frames.load(Ordering::Relaxed);
                Some(frames.saturating_mul(1000) / sr as u64)
            }
            _ => None,
        };
        PlayerStatus {
            now_playing_id: self.now_playing_id.clone(),
            now_playing: self.now_playing.clone(),
            paused,
            phase: self.phase,
            elapsed_ms,
            duration_ms: self.duration_ms,
            source_codec: self.source_codec.clone(),
            container: self.container.clone(),
            sample_rate: self.sample_rate,
            channels: self.channels,
            device: self.device.clone(),
            queue_len: self.queue_len,
            queue_position: self.queue_position,
            end_reason: self.end_reason,
        }
    }

    /// Clear track-specific fields when playback ends. The end reason and
    /// phase survive so callers can report why and where playback stopped.
    pub fn clear_playback(&mut self) {
        self.now_playing_id = None;
        self.now_playing = None;
        self.sample_rate = None;
        self.channels = None;
        self.duration_ms = None;
        self.source_codec = None;
        self.container = None;
        self.queue_len = None;
        self.queue_position = None;
        self.played_frames = None;
        self.paused_flag = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reports_elapsed_and_paused() {
        let mut state = StatusState::default();
        state.sample_rate = Some(48_000);
        state.played_frames = Some(Arc::new(AtomicU64::new(96_000)));
        state.paused_flag = Some(Arc::new(AtomicBool::new(true)));

        let snap = state.snapshot();
        assert_eq!(snap.elapsed_ms, Some(2000));
        assert!(snap.paused);
    }

    #[test]
    fn snapshot_without_counters_is_idle() {
        let state = StatusState::default();
        let snap = state.snapshot();
        assert!(!snap.paused);
        assert!(snap.elapsed_ms.is_none());
        assert!(snap.now_playing.is_none());
    }

    #[test]
    fn clear_playback_resets_track_fields_keeps_end_reason() {
        let mut state = StatusState::default();
        state.now_playing_id = Some("track-1".to_string());
        state.now_playing = Some("https://example.org/a.ogg".to_string());
        state.sample_rate = Some(48_000);
        state.channels = Some(2);
        state.duration_ms = Some(10);
        state.source_codec = Some("VORBIS".to_string());
        state.queue_len = Some(3);
        state.queue_position = Some(1);
        state.played_frames = Some(Arc::new(AtomicU64::new(1)));
        state.paused_flag = Some(Arc::new(AtomicBool::new(false)));
        state.end_reason = Some(PlaybackEndReason::Eof);

        state.clear_playback();

        assert!(state.now_playing_id.is_none());
        assert!(state.now_playing.is_none());
        assert!(state.sample_rate.is_none());
        assert!(state.queue_len.is_none());
        assert!(state.played_frames.is_none());
        assert_eq!(state.end_reason, Some(PlaybackEndReason::Eof));
    }
}
