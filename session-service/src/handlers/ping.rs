/// Liveness probe
#[utoipa::path(
    get,
    path = "/ping",
    responses(
        (status = 200, description = "Service is up", body = String)
    ),
    tag = "Observability"
)]
pub async fn ping() -> &'static str {
    "pong"
}
