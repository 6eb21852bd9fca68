use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use thiserror::Error;
use tracing::info;

use crate::application::repos::{CreateUserParams, RepoError, UsersRepo};
use crate::domain::entities::UserRecord;

const MIN_PASSWORD_LEN: usize = 5;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("E-Mail exists already, please pick a different one.")]
    EmailTaken,
    #[error("{0}")]
    InvalidInput(&'static str),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

impl AuthError {
    /// Message safe to show back to the person filling in the form.
    pub fn user_message(&self) -> Option<String> {
        match self {
            AuthError::EmailTaken | AuthError::InvalidInput(_) => Some(self.to_string()),
            AuthError::Repo(_) | AuthError::Hashing(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SignupCommand {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UsersRepo>,
}

impl AuthService {
    pub fn new(users: Arc<dyn UsersRepo>) -> Self {
        Self { users }
    }

    pub async fn signup(&self, command: SignupCommand) -> Result<UserRecord, AuthError> {
        let email = normalize_email(&command.email);
        if email.is_empty() || !email.contains('@') {
            return Err(AuthError::InvalidInput("Please enter a valid email."));
        }
        if command.password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::InvalidInput(
                "Please enter a password with at least 5 characters.",
            ));
        }
        if command.password != command.confirm_password {
            return Err(AuthError::InvalidInput("Passwords have to match!"));
        }

        if self.users.find_user_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = hash_password(command.password).await?;
        let user = self
            .users
            .create_user(CreateUserParams {
                email,
                password_hash,
            })
            .await
            .map_err(|err| match err {
                RepoError::Duplicate { .. } => AuthError::EmailTaken,
                other => AuthError::Repo(other),
            })?;

        info!(target = "shopfront::auth", user_id = %user.id, "user signed up");
        Ok(user)
    }

    /// Returns `None` when the email is unknown or the password does not match.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<UserRecord>, AuthError> {
        let email = normalize_email(email);
        let Some(user) = self.users.find_user_by_email(&email).await? else {
            return Ok(None);
        };

        let matches = verify_password(password.to_string(), user.password_hash.clone()).await?;
        Ok(matches.then_some(user))
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

async fn hash_password(password: String) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| AuthError::Hashing(err.to_string()))
    })
    .await
    .map_err(|err| AuthError::Hashing(err.to_string()))?
}

async fn verify_password(password: String, stored_hash: String) -> Result<bool, AuthError> {
    tokio::task::spawn_blocking(move || {
        let parsed =
            PasswordHash::new(&stored_hash).map_err(|err| AuthError::Hashing(err.to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    })
    .await
    .map_err(|err| AuthError::Hashing(err.to_string()))?
}
