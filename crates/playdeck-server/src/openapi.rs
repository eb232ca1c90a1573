use utoipa::OpenApi;

use crate::api;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::sessions::sessions_create,
        api::sessions::sessions_list,
        api::playback::play_batch,
        api::playback::pause,
        api::playback::stop,
        api::playback::status,
        api::health::health,
    ),
    components(
        schemas(
            playdeck_types::PlayableItem,
            playdeck_types::PlayRequest,
            playdeck_types::SessionRequest,
            playdeck_types::SessionInfo,
            playdeck_types::PlayerStatus,
            playdeck_types::PlayerPhase,
            playdeck_types::PlaybackEndReason,
            playdeck_types::HealthInfo,
        )
    ),
    tags(
        (name = "playdeck-server", description = "Playback session host API")
    )
)]
pub struct ApiDoc;
