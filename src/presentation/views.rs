use crate::application::error::{ErrorReport, HttpError};
use crate::domain::entities::ProductRecord;
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(locals: &PageLocals) -> Response {
    let view = LayoutContext::new(locals, "Page Not Found", "/404", ());
    let mut response = render_template_response(NotFoundTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

/// Render the generic error page with `status`.
pub fn render_error_page(locals: &PageLocals, status: StatusCode) -> Response {
    let view = LayoutContext::new(locals, "Error!", "/500", ());
    render_template_response(ErrorTemplate { view }, status)
}

/// Values every rendered page needs from the request pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageLocals {
    pub is_authenticated: bool,
    pub csrf_token: String,
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub page_title: String,
    /// Navigation key used to highlight the active link.
    pub path: &'static str,
    pub is_authenticated: bool,
    pub csrf_token: String,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(
        locals: &PageLocals,
        page_title: impl Into<String>,
        path: &'static str,
        content: T,
    ) -> Self {
        Self {
            page_title: page_title.into(),
            path,
            is_authenticated: locals.is_authenticated,
            csrf_token: locals.csrf_token.clone(),
            content,
        }
    }
}

#[derive(Clone)]
pub struct ProductCard {
    pub title: String,
    pub price: String,
    pub description: String,
    pub image_url: String,
}

impl From<&ProductRecord> for ProductCard {
    fn from(product: &ProductRecord) -> Self {
        Self {
            title: product.title.clone(),
            price: format!("{:.2}", product.price),
            description: product.description.clone(),
            image_url: product.image_url.clone(),
        }
    }
}

#[derive(Clone, Default)]
pub struct ProductListView {
    pub products: Vec<ProductCard>,
}

impl ProductListView {
    pub fn from_records(records: &[ProductRecord]) -> Self {
        Self {
            products: records.iter().map(ProductCard::from).collect(),
        }
    }
}

#[derive(Clone, Default)]
pub struct ProductFormView {
    pub title: String,
    pub price: String,
    pub description: String,
    pub error_message: Option<String>,
}

#[derive(Clone, Default)]
pub struct AuthFormView {
    pub email: String,
    pub error_message: Option<String>,
}

#[derive(Template)]
#[template(path = "shop/index.html")]
pub struct ShopIndexTemplate {
    pub view: LayoutContext<ProductListView>,
}

#[derive(Template)]
#[template(path = "admin/products.html")]
pub struct AdminProductsTemplate {
    pub view: LayoutContext<ProductListView>,
}

#[derive(Template)]
#[template(path = "admin/edit-product.html")]
pub struct EditProductTemplate {
    pub view: LayoutContext<ProductFormView>,
}

#[derive(Template)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub view: LayoutContext<AuthFormView>,
}

#[derive(Template)]
#[template(path = "auth/signup.html")]
pub struct SignupTemplate {
    pub view: LayoutContext<AuthFormView>,
}

#[derive(Template)]
#[template(path = "404.html")]
pub struct NotFoundTemplate {
    pub view: LayoutContext<()>,
}

#[derive(Template)]
#[template(path = "500.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<()>,
}
