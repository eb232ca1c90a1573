//! Session handle API handlers.

use actix_web::{HttpResponse, Responder, get, post, web};

use playdeck_types::{SessionInfo, SessionRequest};

use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/sessions",
    request_body = SessionRequest,
    responses(
        (status = 200, description = "Session created or refreshed", body = SessionInfo),
        (status = 400, description = "Missing client id")
    )
)]
#[post("/sessions")]
/// Create or refresh the session for a client id.
pub async fn sessions_create(
    state: web::Data<AppState>,
    body: web::Json<SessionRequest>,
) -> impl Responder {
    let client_id = body.into_inner().client_id.trim().to_string();
    if client_id.is_empty() {
        return HttpResponse::BadRequest().body("client_id is required");
    }
    let session_id = state.sessions.create_or_refresh(&client_id);
    HttpResponse::Ok().json(SessionInfo {
        session_id,
        client_id,
    })
}

#[utoipa::path(
    get,
    path = "/sessions",
    responses(
        (status = 200, description = "Known sessions", body = [SessionInfo])
    )
)]
#[get("/sessions")]
/// List known sessions.
pub async fn sessions_list(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(state.sessions.list())
}
