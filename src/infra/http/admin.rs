use axum::{
    Form, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use serde::Deserialize;

use crate::{
    application::{
        error::AppError,
        products::{AddProductCommand, ProductError},
    },
    presentation::views::{
        AdminProductsTemplate, EditProductTemplate, LayoutContext, PageLocals, ProductFormView,
        ProductListView, render_template_response,
    },
};

use super::{
    AppState,
    current_user::{AuthenticatedUser, require_login},
    upload::Upload,
};

const NOT_AN_IMAGE: &str = "Attached file is not an image.";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/add-product", get(add_product_form).post(add_product))
        .route("/products", get(products))
        .route_layer(middleware::from_fn(require_login))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProductForm {
    title: String,
    price: String,
    description: String,
}

async fn add_product_form(locals: PageLocals) -> Response {
    render_form(&locals, ProductFormView::default(), StatusCode::OK)
}

async fn add_product(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    locals: PageLocals,
    Upload(image): Upload,
    Form(form): Form<ProductForm>,
) -> Response {
    let Some(image) = image else {
        return render_form(
            &locals,
            form_view(form, NOT_AN_IMAGE),
            StatusCode::UNPROCESSABLE_ENTITY,
        );
    };

    let command = AddProductCommand {
        title: form.title.clone(),
        price: form.price.clone(),
        description: form.description.clone(),
        image_url: image.url,
        user_id: user.id,
    };

    match state.products.add(command).await {
        Ok(_) => Redirect::to("/admin/products").into_response(),
        Err(ProductError::InvalidInput(message)) => {
            let _ = tokio::fs::remove_file(&image.path).await;
            render_form(
                &locals,
                form_view(form, message),
                StatusCode::UNPROCESSABLE_ENTITY,
            )
        }
        Err(err) => AppError::from(err).into_response(),
    }
}

async fn products(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    locals: PageLocals,
) -> Response {
    let products = match state.products.owned_by(user.id).await {
        Ok(products) => products,
        Err(err) => return AppError::from(err).into_response(),
    };

    let view = LayoutContext::new(
        &locals,
        "Admin Products",
        "/admin/products",
        ProductListView::from_records(&products),
    );
    render_template_response(AdminProductsTemplate { view }, StatusCode::OK)
}

fn form_view(form: ProductForm, message: &str) -> ProductFormView {
    ProductFormView {
        title: form.title,
        price: form.price,
        description: form.description,
        error_message: Some(message.to_string()),
    }
}

fn render_form(locals: &PageLocals, content: ProductFormView, status: StatusCode) -> Response {
    let view = LayoutContext::new(locals, "Add Product", "/admin/add-product", content);
    render_template_response(EditProductTemplate { view }, status)
}
