mod admin;
mod auth;
pub mod csrf;
pub mod current_user;
mod errors;
pub mod flash;
mod locals;
mod middleware;
pub mod session;
mod shop;
pub mod upload;

use std::{path::PathBuf, sync::Arc};

use axum::{
    Router,
    body::Body,
    extract::{DefaultBodyLimit, OriginalUri},
    http::Request,
    middleware::{Next, from_fn, from_fn_with_state},
    response::Response,
    routing::get,
};
use tower::Layer;
use tower_http::services::ServeDir;
use tower_sessions::SessionStore;

use crate::{
    application::{auth::AuthService, current_user::CurrentUserResolver, products::ProductService},
    config::SessionSettings,
    infra::uploads::{ImageStorage, PUBLIC_PREFIX},
};

pub use middleware::RequestId;

/// Shared services handed to every handler and pipeline stage.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub products: Arc<ProductService>,
    pub current_user: Arc<CurrentUserResolver>,
    pub images: Arc<ImageStorage>,
    pub public_directory: PathBuf,
    pub body_limit: usize,
}

/// Assemble static assets, route groups and the request pipeline.
///
/// Files under the public directory and the upload directory are answered before
/// any session work. Everything else runs through, in order: body limit, session,
/// error pages, uploads, CSRF, page locals, current user, then the route groups
/// with the not-found page as fallback. The request tracer wraps both.
pub fn build_router<S>(
    state: AppState,
    session_store: S,
    session: &SessionSettings,
    secret: &str,
) -> Router
where
    S: SessionStore + Clone,
{
    let pages = Router::new()
        .nest("/admin", admin::router())
        .merge(shop::router())
        .merge(auth::router())
        .route("/500", get(errors::get_500))
        .fallback(errors::not_found)
        .method_not_allowed_fallback(errors::not_found)
        .layer(from_fn_with_state(
            state.clone(),
            current_user::resolve_current_user,
        ))
        .layer(from_fn(locals::expose_page_locals))
        .layer(from_fn_with_state(state.clone(), csrf::csrf_guard))
        .layer(from_fn_with_state(state.clone(), upload::store_uploads))
        .layer(from_fn(errors::render_error_pages))
        .layer(session::session_layer(session_store, session, secret))
        .layer(DefaultBodyLimit::max(state.body_limit))
        .with_state(state.clone());

    let images = ServeDir::new(state.images.root())
        .call_fallback_on_method_not_allowed(true)
        .fallback(from_fn(restore_original_uri).layer(pages.clone()));
    let public = ServeDir::new(&state.public_directory)
        .call_fallback_on_method_not_allowed(true)
        .fallback(pages);

    Router::new()
        .nest_service(PUBLIC_PREFIX, images)
        .fallback_service(public)
        .layer(from_fn(middleware::trace_requests))
}

/// Undo the prefix stripping of the `/images` mount before a miss reaches the pages.
async fn restore_original_uri(mut request: Request<Body>, next: Next) -> Response {
    if let Some(OriginalUri(uri)) = request.extensions().get::<OriginalUri>().cloned() {
        *request.uri_mut() = uri;
    }
    next.run(request).await
}
