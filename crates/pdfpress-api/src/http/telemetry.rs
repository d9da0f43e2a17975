//! Request counting middleware.

use std::sync::Arc;

use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use pdfpress_telemetry::RequestContext;

use crate::http::constants::HEADER_REQUEST_ID;
use crate::state::ApiState;

/// Count each request by matched route and status code. Handlers run inside
/// the request's [`RequestContext`].
pub(crate) async fn track_requests(
    State(state): State<Arc<ApiState>>,
    request: Request,
    next: Next,
) -> Response {
    let route = request.extensions().get::<MatchedPath>().map_or_else(
        || request.uri().path().to_string(),
        |matched| matched.as_str().to_string(),
    );
    let request_id = request
        .headers()
        .get(HEADER_REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_owned();

    RequestContext::new(request_id, route.as_str()).scope(async move {
        let response = next.run(request).await;
        state
            .telemetry
            .inc_http_request(&route, response.status().as_u16());
        response
    })
    .await
}
