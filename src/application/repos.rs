//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::{ProductRecord, UserRecord};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct CreateUserParams {
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct CreateProductParams {
    pub title: String,
    pub price: f64,
    pub description: String,
    pub image_url: String,
    pub user_id: Uuid,
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn find_user(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepoError>;

    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError>;
}

#[async_trait]
pub trait ProductsRepo: Send + Sync {
    async fn list_products(&self) -> Result<Vec<ProductRecord>, RepoError>;

    async fn list_products_by_user(&self, user_id: Uuid) -> Result<Vec<ProductRecord>, RepoError>;

    async fn create_product(&self, params: CreateProductParams)
    -> Result<ProductRecord, RepoError>;
}
