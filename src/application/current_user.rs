//! Resolution of the session-referenced user into a fresh persisted record.

use std::sync::Arc;

use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::application::repos::{RepoError, UsersRepo};
use crate::domain::entities::UserRecord;
use crate::infra::telemetry::USER_LOOKUP_TOTAL;

/// Minimal user reference kept in the session. Only the id is trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: Uuid,
}

impl From<&UserRecord> for SessionUser {
    fn from(user: &UserRecord) -> Self {
        Self { id: user.id }
    }
}

/// Outcome of a successful resolution attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum UserResolution {
    /// The session carries no user reference; nothing was looked up.
    Anonymous,
    /// The referenced user exists.
    Resolved(UserRecord),
    /// The referenced user no longer exists. The reference is left in place.
    Stale { id: Uuid },
}

impl UserResolution {
    pub fn into_user(self) -> Option<UserRecord> {
        match self {
            UserResolution::Resolved(user) => Some(user),
            UserResolution::Anonymous | UserResolution::Stale { .. } => None,
        }
    }
}

#[derive(Clone)]
pub struct CurrentUserResolver {
    users: Arc<dyn UsersRepo>,
}

impl CurrentUserResolver {
    pub fn new(users: Arc<dyn UsersRepo>) -> Self {
        Self { users }
    }

    /// Issue at most one lookup for the referenced user. Persistence failures are
    /// returned as errors and never collapsed into "no user".
    pub async fn resolve(
        &self,
        reference: Option<&SessionUser>,
    ) -> Result<UserResolution, RepoError> {
        let Some(reference) = reference else {
            return Ok(UserResolution::Anonymous);
        };

        match self.users.find_user(reference.id).await {
            Ok(Some(user)) => {
                counter!(USER_LOOKUP_TOTAL, "outcome" => "resolved").increment(1);
                Ok(UserResolution::Resolved(user))
            }
            Ok(None) => {
                counter!(USER_LOOKUP_TOTAL, "outcome" => "stale").increment(1);
                debug!(
                    target = "shopfront::current_user",
                    user_id = %reference.id,
                    "session references a user that no longer exists"
                );
                Ok(UserResolution::Stale { id: reference.id })
            }
            Err(err) => {
                counter!(USER_LOOKUP_TOTAL, "outcome" => "error").increment(1);
                Err(err)
            }
        }
    }
}
