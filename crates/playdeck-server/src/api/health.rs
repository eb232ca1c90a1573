use actix_web::{HttpResponse, Responder, get};

use playdeck_types::HealthInfo;

/// Basic health check for clients and discovery.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Session host is healthy", body = HealthInfo)
    )
)]
#[get("/health")]
pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(HealthInfo {
        status: "ok".to_string(),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: crate::VERSION.to_string(),
    })
}
