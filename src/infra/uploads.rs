//! Filesystem storage for accepted product images.

use std::error::Error as StdError;
use std::path::{Component, Path, PathBuf};

use axum::http::StatusCode;
use bytes::Bytes;
use futures::{Stream, StreamExt, pin_mut};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::{fs, io::AsyncWriteExt};

use crate::domain::uploads::stored_image_name;

/// URL prefix under which the storage directory is served.
pub const PUBLIC_PREFIX: &str = "/images";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Unexpected field `{field}`")]
    UnexpectedField { field: String },
    #[error("invalid multipart body")]
    InvalidForm {
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
    #[error("file name `{0}` cannot be stored")]
    InvalidFilename(String),
    #[error("uploaded body exceeds configured limit")]
    PayloadTooLarge {
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
    #[error("uploaded file stream failed")]
    PayloadStream {
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
    #[error("failed to format stored file name")]
    Format(#[from] time::error::Format),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl UploadError {
    /// Status recorded in the error report. Clients always get the 500 error page.
    pub fn status(&self) -> StatusCode {
        match self {
            UploadError::UnexpectedField { .. }
            | UploadError::InvalidForm { .. }
            | UploadError::InvalidFilename(_) => StatusCode::BAD_REQUEST,
            UploadError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            UploadError::PayloadStream { .. } | UploadError::Format(_) | UploadError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// An accepted file written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub filename: String,
    pub path: PathBuf,
    pub url: String,
    pub size_bytes: u64,
}

#[derive(Debug)]
pub struct ImageStorage {
    root: PathBuf,
}

impl ImageStorage {
    /// Root the storage at `root`, creating the directory if necessary.
    pub fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stream a file to disk under its timestamp-prefixed name.
    ///
    /// A failing stream removes whatever was written so far.
    pub async fn store_stream<S>(
        &self,
        original_name: &str,
        stream: S,
    ) -> Result<StoredImage, UploadError>
    where
        S: Stream<Item = Result<Bytes, UploadError>>,
    {
        ensure_plain_name(original_name)?;
        let filename = stored_image_name(OffsetDateTime::now_utc(), original_name)?;
        let path = self.root.join(&filename);

        let mut file = fs::File::create(&path).await?;
        let mut size_bytes: u64 = 0;

        pin_mut!(stream);
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => {
                    drop(file);
                    let _ = fs::remove_file(&path).await;
                    return Err(err);
                }
            };
            if let Err(err) = file.write_all(&chunk).await {
                drop(file);
                let _ = fs::remove_file(&path).await;
                return Err(err.into());
            }
            size_bytes += chunk.len() as u64;
        }
        file.flush().await?;

        let url = format!("{PUBLIC_PREFIX}/{filename}");
        Ok(StoredImage {
            filename,
            path,
            url,
            size_bytes,
        })
    }
}

fn ensure_plain_name(name: &str) -> Result<(), UploadError> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !name.contains(['/', '\\']) => Ok(()),
        _ => Err(UploadError::InvalidFilename(name.to_string())),
    }
}
