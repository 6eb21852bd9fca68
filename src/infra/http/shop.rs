use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};

use crate::{
    application::error::AppError,
    presentation::views::{
        LayoutContext, PageLocals, ProductListView, ShopIndexTemplate, render_template_response,
    },
};

use super::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(index))
}

async fn index(State(state): State<AppState>, locals: PageLocals) -> Response {
    let products = match state.products.catalog().await {
        Ok(products) => products,
        Err(err) => return AppError::from(err).into_response(),
    };

    let view = LayoutContext::new(
        &locals,
        "Shop",
        "/",
        ProductListView::from_records(&products),
    );
    render_template_response(ShopIndexTemplate { view }, StatusCode::OK)
}
