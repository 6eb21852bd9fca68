//! Request ids and the one log line written per request.

use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

use super::current_user::Visitor;

static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Id assigned to every request, echoed in the `x-request-id` response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestId(pub Uuid);

/// Outermost stage. Static assets pass through here too, so they carry no visitor.
pub async fn trace_requests(mut request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4();
    request.extensions_mut().insert(RequestId(request_id));
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started = Instant::now();

    let mut response = next.run(request).await;
    let status = response.status().as_u16();
    let elapsed_ms = started.elapsed().as_millis();
    let visitor = response
        .extensions()
        .get::<Visitor>()
        .map_or_else(|| "-".to_string(), ToString::to_string);

    let report = response.extensions_mut().remove::<ErrorReport>();
    match report {
        Some(report) if response.status().is_server_error() => error!(
            target = "shopfront::http::request",
            %request_id,
            %method,
            path = %path,
            status,
            cause_status = report.status.as_u16(),
            source = report.source,
            chain = ?report.messages,
            visitor = %visitor,
            elapsed_ms,
            "request failed",
        ),
        Some(report) => warn!(
            target = "shopfront::http::request",
            %request_id,
            %method,
            path = %path,
            status,
            source = report.source,
            detail = report.messages.first().map(String::as_str).unwrap_or(""),
            visitor = %visitor,
            elapsed_ms,
            "request refused",
        ),
        None => debug!(
            target = "shopfront::http::request",
            %request_id,
            %method,
            path = %path,
            status,
            visitor = %visitor,
            elapsed_ms,
            "request served",
        ),
    }

    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER.clone(), value);
    }
    response
}
