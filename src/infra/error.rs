use std::{io, net::SocketAddr, path::PathBuf};

use thiserror::Error;
use tracing_subscriber::util::TryInitError;

use crate::config::LoadError;

/// Startup failures. Each variant names the step that failed and keeps the cause.
#[derive(Debug, Error)]
pub enum InfraError {
    #[error(transparent)]
    Configuration(#[from] LoadError),
    #[error("failed to {step}")]
    Database {
        step: &'static str,
        #[source]
        source: sqlx::Error,
    },
    #[error("upload directory `{}` is not usable", path.display())]
    UploadDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to listen on {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("failed to install tracing subscriber")]
    Telemetry(#[from] TryInitError),
}

impl InfraError {
    /// Adapter for `map_err` on database calls made during startup.
    pub fn database(step: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| Self::Database { step, source }
    }
}
