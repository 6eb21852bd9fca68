use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(InfraError::from)
}

/// Counter names recorded by the request pipeline.
pub const UPLOAD_REJECTED_TOTAL: &str = "shopfront_upload_rejected_total";
pub const UPLOAD_STORED_TOTAL: &str = "shopfront_upload_stored_total";
pub const CSRF_REJECTED_TOTAL: &str = "shopfront_csrf_rejected_total";
/// Labelled with `outcome`: `resolved`, `stale` or `error`.
pub const USER_LOOKUP_TOTAL: &str = "shopfront_user_lookup_total";

const COUNTERS: [(&str, &str); 4] = [
    (
        UPLOAD_REJECTED_TOTAL,
        "Image parts dropped for an unaccepted media type.",
    ),
    (UPLOAD_STORED_TOTAL, "Product images written to the upload directory."),
    (
        CSRF_REJECTED_TOTAL,
        "Unsafe requests refused for a missing or foreign anti-forgery token.",
    ),
    (
        USER_LOOKUP_TOTAL,
        "Lookups of the user referenced by a session.",
    ),
];

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        for (name, help) in COUNTERS {
            describe_counter!(name, Unit::Count, help);
        }
    });
}
