use chrono::Utc;

use crate::api::{EmptyRequest, HealthResponse, Response};
use crate::context::ServerContext;
use crate::register_public_handlers;

register_public_handlers!(get_healthz);

async fn get_healthz(_req: EmptyRequest, _sc: &ServerContext) -> Response<HealthResponse> {
    let now = Utc::now().timestamp() as u64;
    Response::with_data(HealthResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: now,
    })
}
