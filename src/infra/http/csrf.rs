//! Rejects state-changing requests that do not carry a token minted for the session.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Method, Request, StatusCode, header::CONTENT_TYPE},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::counter;
use tower_sessions::Session;
use tracing::warn;

use crate::{
    application::{
        csrf,
        error::{AppError, HttpError},
    },
    infra::telemetry,
};

use super::{AppState, session};

const TOKEN_FIELD: &str = "_csrf";
const TOKEN_HEADERS: [&str; 4] = ["csrf-token", "xsrf-token", "x-csrf-token", "x-xsrf-token"];
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Token minted for the current request, for embedding in rendered forms.
#[derive(Debug, Clone)]
pub struct CsrfToken(pub String);

pub async fn csrf_guard(
    State(state): State<AppState>,
    session: Session,
    request: Request<Body>,
    next: Next,
) -> Response {
    let secret = match session::ensure_csrf_secret(&session).await {
        Ok(secret) => secret,
        Err(err) => return AppError::from(err).into_response(),
    };

    let mut request = if is_safe(request.method()) {
        request
    } else {
        let (request, supplied) = match extract_token(request, state.body_limit).await {
            Ok(found) => found,
            Err(err) => return err.into_response(),
        };
        let valid = supplied
            .as_deref()
            .is_some_and(|token| csrf::verify_token(&secret, token));
        if !valid {
            counter!(telemetry::CSRF_REJECTED_TOTAL).increment(1);
            warn!(
                target = "shopfront::http::csrf",
                method = %request.method(),
                path = %request.uri().path(),
                token_present = supplied.is_some(),
                "rejecting request with invalid csrf token"
            );
            return AppError::forbidden("invalid csrf token").into_response();
        }
        request
    };

    request
        .extensions_mut()
        .insert(CsrfToken(csrf::mint_token(&secret)));
    next.run(request).await
}

fn is_safe(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Look for a token in the form body, then the query string, then the known headers.
/// A buffered form body is put back so downstream extractors still see it.
async fn extract_token(
    request: Request<Body>,
    body_limit: usize,
) -> Result<(Request<Body>, Option<String>), HttpError> {
    let (parts, body) = request.into_parts();

    let (body, from_body) = if is_form(&parts.headers) {
        let bytes = axum::body::to_bytes(body, body_limit).await.map_err(|err| {
            HttpError::from_error(
                "infra::http::csrf::extract_token",
                StatusCode::PAYLOAD_TOO_LARGE,
                "Request body too large",
                &err,
            )
        })?;
        let token = field_value(&bytes, TOKEN_FIELD);
        (Body::from(bytes), token)
    } else {
        (body, None)
    };

    let token = from_body
        .or_else(|| {
            parts
                .uri
                .query()
                .and_then(|query| field_value(query.as_bytes(), TOKEN_FIELD))
        })
        .or_else(|| header_token(&parts.headers));

    Ok((Request::from_parts(parts, body), token))
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with(FORM_CONTENT_TYPE))
}

fn field_value(encoded: &[u8], name: &str) -> Option<String> {
    url::form_urlencoded::parse(encoded)
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

fn header_token(headers: &HeaderMap) -> Option<String> {
    TOKEN_HEADERS.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
    })
}
