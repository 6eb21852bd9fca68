//! Session cookie configuration and the keys stored in each session.

use sha2::{Digest, Sha512};
use time::Duration;
use tower_sessions::{
    Expiry, Session, SessionManagerLayer, SessionStore,
    cookie::{Key, SameSite},
    service::SignedCookie,
};

use crate::{application::csrf, config::SessionSettings};

pub const IS_LOGGED_IN_KEY: &str = "is_logged_in";
pub const USER_KEY: &str = "user";
pub const CSRF_SECRET_KEY: &str = "csrf_secret";
pub const FLASH_KEY: &str = "flash";

/// Derive the 64-byte cookie signing key from the configured secret.
pub fn signing_key(secret: &str) -> Key {
    let digest = Sha512::digest(secret.as_bytes());
    Key::from(digest.as_slice())
}

/// Sessions are saved only when modified and expire after the configured inactivity window.
pub fn session_layer<S>(
    store: S,
    settings: &SessionSettings,
    secret: &str,
) -> SessionManagerLayer<S, SignedCookie>
where
    S: SessionStore + Clone,
{
    SessionManagerLayer::new(store)
        .with_name(settings.cookie_name.clone())
        .with_http_only(true)
        .with_same_site(SameSite::Lax)
        .with_secure(settings.secure_cookie)
        .with_always_save(false)
        .with_expiry(Expiry::OnInactivity(Duration::days(i64::from(
            settings.inactivity_days.get(),
        ))))
        .with_signed(signing_key(secret))
}

pub async fn is_logged_in(session: &Session) -> Result<bool, tower_sessions::session::Error> {
    Ok(session
        .get::<bool>(IS_LOGGED_IN_KEY)
        .await?
        .unwrap_or(false))
}

/// Return the session's CSRF secret, creating one on first use.
pub async fn ensure_csrf_secret(
    session: &Session,
) -> Result<String, tower_sessions::session::Error> {
    if let Some(secret) = session.get::<String>(CSRF_SECRET_KEY).await? {
        return Ok(secret);
    }
    let secret = csrf::generate_secret();
    session.insert(CSRF_SECRET_KEY, &secret).await?;
    Ok(secret)
}
