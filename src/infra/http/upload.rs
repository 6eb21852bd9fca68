//! Multipart intake for product forms.
//!
//! Text fields are re-encoded as a urlencoded body so later stages and form
//! extractors see an ordinary form submission. The `image` file part is checked
//! against the accepted media types and streamed to disk when it passes. A stored
//! file is removed again if the request ends in an error response.

use std::convert::Infallible;
use std::path::PathBuf;

use axum::{
    body::Body,
    extract::{FromRequest, FromRequestParts, State},
    http::{
        HeaderMap, HeaderValue, Request, StatusCode,
        header::{CONTENT_LENGTH, CONTENT_TYPE},
        request::Parts,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{Multipart, multipart::MultipartError};
use futures::StreamExt;
use metrics::counter;
use tracing::{debug, info, warn};

use crate::{
    application::error::{AppError, ErrorReport},
    domain::uploads::{IMAGE_FIELD, IncomingFile},
    infra::{
        telemetry,
        uploads::{ImageStorage, StoredImage, UploadError},
    },
};

use super::AppState;

const MULTIPART_CONTENT_TYPE: &str = "multipart/form-data";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// An accepted image stored for the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    pub filename: String,
    pub path: PathBuf,
    pub url: String,
    pub content_type: String,
    pub original_name: String,
    pub size_bytes: u64,
}

impl UploadedImage {
    fn new(stored: StoredImage, file: IncomingFile) -> Self {
        Self {
            filename: stored.filename,
            path: stored.path,
            url: stored.url,
            content_type: file.content_type,
            original_name: file.original_name,
            size_bytes: stored.size_bytes,
        }
    }
}

/// Extractor for the image stored by [`store_uploads`], if any.
#[derive(Debug, Clone)]
pub struct Upload(pub Option<UploadedImage>);

impl<S> FromRequestParts<S> for Upload
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<UploadedImage>().cloned()))
    }
}

pub async fn store_uploads(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !is_multipart(request.headers()) {
        return next.run(request).await;
    }

    let request = match read_multipart(&state.images, request).await {
        Ok(request) => request,
        Err(err) => return AppError::from(err).into_response(),
    };
    let stored_path = request
        .extensions()
        .get::<UploadedImage>()
        .map(|image| image.path.clone());

    let response = next.run(request).await;
    if let Some(path) = stored_path
        && response.extensions().get::<ErrorReport>().is_some()
    {
        let _ = tokio::fs::remove_file(&path).await;
    }
    response
}

fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with(MULTIPART_CONTENT_TYPE))
}

async fn read_multipart(
    storage: &ImageStorage,
    request: Request<Body>,
) -> Result<Request<Body>, UploadError> {
    let (mut parts, body) = request.into_parts();

    let mut intake = Request::new(body);
    *intake.headers_mut() = parts.headers.clone();
    *intake.extensions_mut() = parts.extensions.clone();
    let multipart = Multipart::from_request(intake, &())
        .await
        .map_err(|err| UploadError::InvalidForm {
            source: Box::new(err),
        })?;

    let mut stored = None;
    let mut fields = Vec::new();
    if let Err(err) = collect_fields(storage, multipart, &mut fields, &mut stored).await {
        if let Some(image) = stored {
            let _ = tokio::fs::remove_file(&image.path).await;
        }
        return Err(err);
    }

    let encoded = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(fields)
        .finish();

    parts
        .headers
        .insert(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));
    parts
        .headers
        .insert(CONTENT_LENGTH, HeaderValue::from(encoded.len()));
    if let Some(image) = stored {
        parts.extensions.insert(image);
    }

    Ok(Request::from_parts(parts, Body::from(encoded)))
}

async fn collect_fields(
    storage: &ImageStorage,
    mut multipart: Multipart,
    fields: &mut Vec<(String, String)>,
    stored: &mut Option<UploadedImage>,
) -> Result<(), UploadError> {
    let mut image_seen = false;

    while let Some(field) = multipart.next_field().await.map_err(stream_error)? {
        let name = field.name().unwrap_or_default().to_string();

        let Some(original_name) = field.file_name().map(str::to_owned) else {
            let value = field.text().await.map_err(stream_error)?;
            fields.push((name, value));
            continue;
        };

        // A file input left empty still submits a nameless part, whatever its field.
        if original_name.is_empty() {
            continue;
        }
        if name != IMAGE_FIELD || image_seen {
            warn!(
                target = "shopfront::http::upload",
                field = %name,
                "unexpected file field in multipart body"
            );
            return Err(UploadError::UnexpectedField { field: name });
        }
        image_seen = true;

        let file = IncomingFile {
            field_name: name,
            content_type: field.content_type().unwrap_or_default().to_string(),
            original_name,
        };
        if !file.is_accepted() {
            counter!(telemetry::UPLOAD_REJECTED_TOTAL).increment(1);
            debug!(
                target = "shopfront::http::upload",
                content_type = %file.content_type,
                original_name = %file.original_name,
                "dropping upload with unaccepted media type"
            );
            continue;
        }

        let chunks = field.map(|chunk| chunk.map_err(stream_error));
        let image = storage.store_stream(&file.original_name, chunks).await?;
        counter!(telemetry::UPLOAD_STORED_TOTAL).increment(1);
        info!(
            target = "shopfront::http::upload",
            filename = %image.filename,
            size_bytes = image.size_bytes,
            "stored uploaded image"
        );
        *stored = Some(UploadedImage::new(image, file));
    }

    Ok(())
}

fn stream_error(err: MultipartError) -> UploadError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        UploadError::PayloadTooLarge {
            source: Box::new(err),
        }
    } else {
        UploadError::PayloadStream {
            source: Box::new(err),
        }
    }
}
