use serde::{Deserialize, Serialize};

/// Reason why playback of a track ended.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum PlaybackEndReason {
    /// Natural end of stream/file.
    Eof,
    /// Decoder, transport, or output error interrupted playback.
    Error,
    /// Playback was explicitly stopped by a command.
    Stopped,
}

/// Lifecycle phase of the single-track player daemon.
///
/// `Playing` is reachable only from `Prepared`; a failed prepare returns the
/// player to `Idle`.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum PlayerPhase {
    /// No track loaded.
    #[default]
    Idle,
    /// A track is being probed/buffered and cannot produce audio yet.
    Preparing,
    /// Prepare finished; output has not started.
    Prepared,
    /// Audio is being rendered.
    Playing,
    /// Output is suspended but the track stays loaded.
    Paused,
}

/// One playable entry in a play request.
///
/// `id` is the stable key a client uses to refer to the item. `locator` is the
/// fetch URL or filesystem path; when absent, the `id` itself is used as the
/// locator. The optional descriptive fields are display-only and never
/// consulted when resolving the source.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PlayableItem {
    /// Stable item key.
    pub id: String,
    /// Fetch locator (URL or path); defaults to `id` when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locator: Option<String>,
    /// Display title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Display artist.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    /// Display album.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    /// Display genre.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    /// Declared duration in milliseconds, if the client knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl PlayableItem {
    /// Item whose key doubles as its locator.
    pub fn from_locator(locator: impl Into<String>) -> Self {
        PlayableItem {
            id: locator.into(),
            ..PlayableItem::default()
        }
    }

    /// The locator playback should fetch from: `locator` if set, else `id`.
    pub fn effective_locator(&self) -> &str {
        self.locator.as_deref().unwrap_or(&self.id)
    }
}

/// Batch of items submitted to the session host.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PlayRequest {
    pub items: Vec<PlayableItem>,
}

/// Request body for creating or refreshing a session.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SessionRequest {
    /// Caller-chosen client identifier; re-using it refreshes the session.
    pub client_id: String,
}

/// A session known to the host.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SessionInfo {
    /// Server-issued session identifier.
    pub session_id: String,
    /// Client identifier the session was created for.
    pub client_id: String,
}

/// Status snapshot reported by a player daemon.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PlayerStatus {
    /// Stable key of the current item, if any.
    pub now_playing_id: Option<String>,
    /// Effective locator of the current item.
    pub now_playing: Option<String>,
    /// `true` when playback is paused or idle.
    pub paused: bool,
    /// Lifecycle phase, reported by daemons that model one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<PlayerPhase>,
    /// Elapsed playback time in milliseconds.
    pub elapsed_ms: Option<u64>,
    /// Total media duration in milliseconds.
    pub duration_ms: Option<u64>,
    /// Source codec (for example `vorbis`, `mp3`).
    pub source_codec: Option<String>,
    /// Source container format, if known.
    pub container: Option<String>,
    /// Output sample rate (Hz).
    pub sample_rate: Option<u32>,
    /// Channel count.
    pub channels: Option<u16>,
    /// Active output device name, if known.
    pub device: Option<String>,
    /// Number of items in the active queue, for hosts that queue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_len: Option<u32>,
    /// Zero-based position of the current item in the queue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_position: Option<u32>,
    /// End reason when playback transitions to idle.
    pub end_reason: Option<PlaybackEndReason>,
}

/// Liveness payload returned by `/health`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct HealthInfo {
    /// Fixed `"ok"` while the daemon is serving.
    pub status: String,
    /// Daemon name (crate name).
    pub name: String,
    /// Daemon version string, including build stamp.
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_locator_prefers_explicit_locator() {
        let item = PlayableItem {
            id: "track-1".into(),
            locator: Some("https://example.org/a.ogg".into()),
            ..PlayableItem::default()
        };
        assert_eq!(item.effective_locator(), "https://example.org/a.ogg");
    }

    #[test]
    fn effective_locator_falls_back_to_id() {
        let item = PlayableItem::from_locator("https://example.org/a.ogg");
        assert_eq!(item.effective_locator(), "https://example.org/a.ogg");
        assert_eq!(item.id, "https://example.org/a.ogg");
        assert!(item.locator.is_none());
    }

    #[test]
    fn playable_item_round_trips_without_optional_fields() {
        let json = r#"{"id":"https://example.org/a.ogg"}"#;
        let item: PlayableItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.effective_locator(), "https://example.org/a.ogg");
        let back = serde_json::to_string(&item).unwrap();
        assert_eq!(back, json);
    }

    #[test]
    fn end_reason_uses_snake_case() {
        let s = serde_json::to_string(&PlaybackEndReason::Eof).unwrap();
        assert_eq!(s, "\"eof\"");
        let r: PlaybackEndReason = serde_json::from_str("\"stopped\"").unwrap();
        assert_eq!(r, PlaybackEndReason::Stopped);
    }

    #[test]
    fn phase_defaults_to_idle() {
        assert_eq!(PlayerPhase::default(), PlayerPhase::Idle);
    }
}
