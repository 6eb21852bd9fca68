use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tower_sessions::Session;
use tracing::warn;

use crate::{
    application::error::ErrorReport,
    presentation::views::{PageLocals, render_error_page, render_not_found_response},
};

use super::{current_user::Visitor, locals::load_locals};

pub async fn not_found(locals: PageLocals) -> Response {
    render_not_found_response(&locals)
}

pub async fn get_500(locals: PageLocals) -> Response {
    render_error_page(&locals, StatusCode::INTERNAL_SERVER_ERROR)
}

/// Replace every response produced from an error with the generic error page.
///
/// Anti-forgery refusals keep their 403; every other failure is answered with 500.
/// The diagnostic report and visitor move to the new response for the request log.
pub async fn render_error_pages(session: Session, request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;
    if response.status() == StatusCode::NOT_FOUND {
        return response;
    }
    let Some(report) = response.extensions_mut().remove::<ErrorReport>() else {
        return response;
    };
    let status = match response.status() {
        StatusCode::FORBIDDEN => StatusCode::FORBIDDEN,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let locals = match load_locals(&session).await {
        Ok(locals) => locals,
        Err(err) => {
            warn!(
                target = "shopfront::http::errors",
                error = %err,
                "session unavailable while rendering error page"
            );
            PageLocals::default()
        }
    };

    let mut page = render_error_page(&locals, status);
    page.extensions_mut().insert(report);
    if let Some(visitor) = response.extensions_mut().remove::<Visitor>() {
        page.extensions_mut().insert(visitor);
    }
    page
}
