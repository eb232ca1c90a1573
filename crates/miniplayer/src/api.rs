//! HTTP control surface.
//!
//! The pair of playback verbs keeps the legacy names `play_song` and
//! `pause_song` so existing callers (the desk remote included) keep working.

use std::sync::{Arc, Mutex};

use actix_web::{HttpResponse, Responder, get, post, web};

use playdeck_engine::status::StatusState;
use playdeck_types::HealthInfo;

use crate::player::{PlayerCommand, PlayerHandle};

/// Shared state handed to every handler.
pub(crate) struct AppState {
    pub(crate) player: PlayerHandle,
    pub(crate) status: Arc<Mutex<StatusState>>,
}

#[derive(Debug, serde::Deserialize)]
pub(crate) struct PlaySongRequest {
    url: String,
}

#[post("/play_song")]
/// Start playing `url`, releasing whatever was playing before.
pub(crate) async fn play_song(
    state: web::Data<AppState>,
    body: web::Json<PlaySongRequest>,
) -> impl Responder {
    let url = body.into_inner().url.trim().to_string();
    if url.is_empty() {
        return HttpResponse::BadRequest().body("url is required");
    }
    match state.player.cmd_tx.send(PlayerCommand::Play { url }) {
        Ok(()) => HttpResponse::Ok().finish(),
        Err(_) => HttpResponse::InternalServerError().body("player offline"),
    }
}

#[post("/pause_song")]
/// Pause the playing track. A no-op unless something is playing.
pub(crate) async fn pause_song(state: web::Data<AppState>) -> impl Responder {
    tracing::info!("pause_song received");
    match state.player.cmd_tx.send(PlayerCommand::Pause) {
        Ok(()) => HttpResponse::Ok().finish(),
        Err(_) => HttpResponse::InternalServerError().body("player offline"),
    }
}

#[get("/status")]
/// Current playback status snapshot.
pub(crate) async fn status(state: web::Data<AppState>) -> impl Responder {
    let snapshot = match state.status.lock() {
        Ok(st) => st.snapshot(),
        Err(_) => return HttpResponse::InternalServerError().body("status unavailable"),
    };
    HttpResponse::Ok().json(snapshot)
}

#[get("/health")]
pub(crate) async fn health() -> impl Responder {
    HttpResponse::Ok().json(HealthInfo {
        status: "ok".to_string(),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: crate::cli::VERSION.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, test};
    use crossbeam_channel::{Receiver, unbounded};
    use playdeck_types::{PlayerPhase, PlayerStatus};

    fn make_state() -> (web::Data<AppState>, Receiver<PlayerCommand>) {
        let (cmd_tx, cmd_rx) = unbounded();
        let state = web::Data::new(AppState {
            player: PlayerHandle { cmd_tx },
            status: StatusState::shared(),
        });
        (state, cmd_rx)
    }

    #[actix_web::test]
    async fn play_song_forwards_url_to_player() {
        let (state, cmd_rx) = make_state();
        let app = test::init_service(App::new().app_data(state).service(play_song)).await;

        let req = test::TestRequest::post()
            .uri("/play_song")
            .set_json(serde_json::json!({ "url": "https://example.org/a.ogg" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let cmd = cmd_rx.try_recv().unwrap();
        assert!(
            matches!(cmd, PlayerCommand::Play { ref url } if url == "https://example.org/a.ogg")
        );
    }

    #[actix_web::test]
    async fn play_song_rejects_blank_url() {
        let (state, cmd_rx) = make_state();
        let app = test::init_service(App::new().app_data(state).service(play_song)).await;

        let req = test::TestRequest::post()
            .uri("/play_song")
            .set_json(serde_json::json!({ "url": "   " }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);
        assert!(cmd_rx.try_recv().is_err());
    }

    #[actix_web::test]
    async fn pause_song_forwards_pause() {
        let (state, cmd_rx) = make_state();
        let app = test::init_service(App::new().app_data(state).service(pause_song)).await;

        let req = test::TestRequest::post().uri("/pause_song").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
        assert!(matches!(cmd_rx.try_recv(), Ok(PlayerCommand::Pause)));
    }

    #[actix_web::test]
    async fn status_starts_idle() {
        let (state, _cmd_rx) = make_state();
        state.status.lock().unwrap().phase = Some(PlayerPhase::Idle);
        let app = test::init_service(App::new().app_data(state).service(status)).await;

        let req = test::TestRequest::get().uri("/status").to_request();
        let body: PlayerStatus = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.phase, Some(PlayerPhase::Idle));
        assert!(body.now_playing.is_none());
        assert!(!body.paused);
    }

    #[actix_web::test]
    async fn health_reports_ok() {
        let (state, _cmd_rx) = make_state();
        let app = test::init_service(App::new().app_data(state).service(health)).await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: HealthInfo = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.status, "ok");
        assert_eq!(body.name, "miniplayer");
    }
}
