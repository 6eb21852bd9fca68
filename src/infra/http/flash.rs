//! One-shot notices carried across a redirect in the session.

use std::collections::BTreeMap;

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use crate::application::error::HttpError;

use super::session::FLASH_KEY;

type FlashMessages = BTreeMap<String, Vec<String>>;

pub const ERROR: &str = "error";

/// Session-backed flash queue. Each queued message is handed out at most once.
#[derive(Clone)]
pub struct Flash {
    session: Session,
}

impl Flash {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    pub async fn push(
        &self,
        kind: &str,
        message: impl Into<String>,
    ) -> Result<(), tower_sessions::session::Error> {
        let mut messages = self.load().await?;
        messages
            .entry(kind.to_string())
            .or_default()
            .push(message.into());
        self.session.insert(FLASH_KEY, messages).await
    }

    /// Remove and return every message queued under `kind`.
    pub async fn take(&self, kind: &str) -> Result<Vec<String>, tower_sessions::session::Error> {
        let mut messages = self.load().await?;
        let Some(taken) = messages.remove(kind) else {
            return Ok(Vec::new());
        };
        if messages.is_empty() {
            self.session.remove::<FlashMessages>(FLASH_KEY).await?;
        } else {
            self.session.insert(FLASH_KEY, messages).await?;
        }
        Ok(taken)
    }

    /// First message of `kind`, discarding the rest.
    pub async fn take_first(
        &self,
        kind: &str,
    ) -> Result<Option<String>, tower_sessions::session::Error> {
        Ok(self.take(kind).await?.into_iter().next())
    }

    async fn load(&self) -> Result<FlashMessages, tower_sessions::session::Error> {
        Ok(self
            .session
            .get::<FlashMessages>(FLASH_KEY)
            .await?
            .unwrap_or_default())
    }
}

impl<S> FromRequestParts<S> for Flash
where
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|(status, message)| {
                HttpError::new("infra::http::flash::Flash", status, message, message)
            })?;
        Ok(Self::new(session))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tower_sessions::MemoryStore;

    use super::*;

    fn flash() -> Flash {
        Flash::new(Session::new(None, Arc::new(MemoryStore::default()), None))
    }

    #[tokio::test]
    async fn messages_are_delivered_once() {
        let flash = flash();
        flash
            .push(ERROR, "Invalid email or password.")
            .await
            .expect("push");

        assert_eq!(
            flash.take(ERROR).await.expect("take"),
            vec!["Invalid email or password.".to_string()]
        );
        assert!(flash.take(ERROR).await.expect("take").is_empty());
    }

    #[tokio::test]
    async fn kinds_are_independent() {
        let flash = flash();
        flash.push(ERROR, "first").await.expect("push");
        flash.push(ERROR, "second").await.expect("push");
        flash.push("info", "saved").await.expect("push");

        assert_eq!(
            flash.take_first(ERROR).await.expect("take"),
            Some("first".to_string())
        );
        assert!(flash.take(ERROR).await.expect("take").is_empty());
        assert_eq!(
            flash.take("info").await.expect("take"),
            vec!["saved".to_string()]
        );
        assert!(
            flash
                .session
                .get::<FlashMessages>(FLASH_KEY)
                .await
                .expect("get")
                .is_none()
        );
    }
}
