//! Playback API handlers.

use actix_web::{HttpResponse, Responder, get, post, web};

use playdeck_types::PlayRequest;

use crate::state::AppState;
use crate::worker::{self, PlayerCommand};

#[utoipa::path(
    post,
    path = "/play",
    request_body = PlayRequest,
    responses(
        (status = 200, description = "Batch accepted"),
        (status = 400, description = "Empty batch or item without id/locator"),
        (status = 500, description = "Player offline")
    )
)]
#[post("/play")]
/// Resolve the submitted batch and hand it to the playback worker.
pub async fn play_batch(state: web::Data<AppState>, body: web::Json<PlayRequest>) -> impl Responder {
    let items = body.into_inner().items;
    let tracks = match worker::resolve_batch(items) {
        Ok(tracks) => tracks,
        Err(e) => return HttpResponse::BadRequest().body(format!("{e:#}")),
    };
    tracing::info!(items = tracks.len(), "play request");
    match state
        .player
        .cmd_tx
        .send(PlayerCommand::PlayBatch { items: tracks })
    {
        Ok(()) => HttpResponse::Ok().finish(),
        Err(_) => HttpResponse::InternalServerError().body("player offline"),
    }
}

#[utoipa::path(
    post,
    path = "/pause",
    responses(
        (status = 200, description = "Paused, or nothing to pause"),
        (status = 500, description = "Player offline")
    )
)]
#[post("/pause")]
/// Pause active playback. A no-op when nothing has been submitted.
pub async fn pause(state: web::Data<AppState>) -> impl Responder {
    tracing::info!("pause request");
    match state.player.cmd_tx.send(PlayerCommand::Pause) {
        Ok(()) => HttpResponse::Ok().finish(),
        Err(_) => HttpResponse::InternalServerError().body("player offline"),
    }
}

#[utoipa::path(
    post,
    path = "/stop",
    responses(
        (status = 200, description = "Playback stopped"),
        (status = 500, description = "Player offline")
    )
)]
#[post("/stop")]
/// Cancel the active session and go idle.
pub async fn stop(state: web::Data<AppState>) -> impl Responder {
    tracing::info!("stop request");
    match state.player.cmd_tx.send(PlayerCommand::Stop) {
        Ok(()) => HttpResponse::Ok().finish(),
        Err(_) => HttpResponse::InternalServerError().body("player offline"),
    }
}

#[utoipa::path(
    get,
    path = "/status",
    responses(
        (status = 200, description = "Playback status", body = playdeck_types::PlayerStatus)
    )
)]
#[get("/status")]
/// Current playback status snapshot.
pub async fn status(state: web::Data<AppState>) -> impl Responder {
    let snapshot = state
        .status
        .lock()
        .unwrap_or_else(|err| err.into_inner())
        .snapshot();
    HttpResponse::Ok().json(snapshot)
}
