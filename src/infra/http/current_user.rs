//! Attaches the session's user to the request before any route group sees it.

use std::fmt;

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{Request, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use uuid::Uuid;

use crate::{
    application::{
        current_user::{SessionUser, UserResolution},
        error::AppError,
    },
    domain::entities::UserRecord,
};

use super::{AppState, session};

/// Who a response was produced for, as seen by the resolver. Attached to the
/// response for the request log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visitor {
    Anonymous,
    User(Uuid),
    Stale(Uuid),
}

impl fmt::Display for Visitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visitor::Anonymous => f.write_str("anonymous"),
            Visitor::User(id) => write!(f, "user:{id}"),
            Visitor::Stale(id) => write!(f, "stale:{id}"),
        }
    }
}

/// Request extension present only when the session's user still exists.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserRecord);

pub async fn resolve_current_user(
    State(state): State<AppState>,
    session: Session,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let reference = match session.get::<SessionUser>(session::USER_KEY).await {
        Ok(reference) => reference,
        Err(err) => return AppError::from(err).into_response(),
    };

    let visitor = match state.current_user.resolve(reference.as_ref()).await {
        Ok(UserResolution::Resolved(user)) => {
            let visitor = Visitor::User(user.id);
            request.extensions_mut().insert(CurrentUser(user));
            visitor
        }
        Ok(UserResolution::Anonymous) => Visitor::Anonymous,
        Ok(UserResolution::Stale { id }) => Visitor::Stale(id),
        Err(err) => return AppError::from(err).into_response(),
    };

    let mut response = next.run(request).await;
    response.extensions_mut().insert(visitor);
    response
}

/// Redirects to the login page unless the session is marked as logged in.
pub async fn require_login(session: Session, request: Request<Body>, next: Next) -> Response {
    match session::is_logged_in(&session).await {
        Ok(true) => next.run(request).await,
        Ok(false) => Redirect::to("/login").into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

/// The resolved user; fails the request when the session's user could not be resolved.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub UserRecord);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .map(|current| Self(current.0.clone()))
            .ok_or_else(|| AppError::unexpected("no resolved user for this request"))
    }
}
