//! Per-request values shared with every rendered page.

use std::convert::Infallible;

use axum::{
    body::Body,
    extract::FromRequestParts,
    http::{Request, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower_sessions::Session;

use crate::{
    application::{csrf, error::AppError},
    presentation::views::PageLocals,
};

use super::{csrf::CsrfToken, session};

/// Build page locals straight from the session, minting a fresh token.
pub async fn load_locals(
    session: &Session,
) -> Result<PageLocals, tower_sessions::session::Error> {
    let is_authenticated = session::is_logged_in(session).await?;
    let secret = session::ensure_csrf_secret(session).await?;
    Ok(PageLocals {
        is_authenticated,
        csrf_token: csrf::mint_token(&secret),
    })
}

pub async fn expose_page_locals(
    session: Session,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let token = request
        .extensions()
        .get::<CsrfToken>()
        .map(|token| token.0.clone());

    let locals = match token {
        Some(csrf_token) => match session::is_logged_in(&session).await {
            Ok(is_authenticated) => PageLocals {
                is_authenticated,
                csrf_token,
            },
            Err(err) => return AppError::from(err).into_response(),
        },
        None => match load_locals(&session).await {
            Ok(locals) => locals,
            Err(err) => return AppError::from(err).into_response(),
        },
    };

    request.extensions_mut().insert(locals);
    next.run(request).await
}

impl<S> FromRequestParts<S> for PageLocals
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<PageLocals>()
            .cloned()
            .unwrap_or_default())
    }
}
