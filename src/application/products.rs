use std::sync::Arc;

use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::application::repos::{CreateProductParams, ProductsRepo, RepoError};
use crate::domain::entities::ProductRecord;

#[derive(Debug, Error)]
pub enum ProductError {
    #[error("{0}")]
    InvalidInput(&'static str),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct AddProductCommand {
    pub title: String,
    pub price: String,
    pub description: String,
    pub image_url: String,
    pub user_id: Uuid,
}

#[derive(Clone)]
pub struct ProductService {
    repo: Arc<dyn ProductsRepo>,
}

impl ProductService {
    pub fn new(repo: Arc<dyn ProductsRepo>) -> Self {
        Self { repo }
    }

    pub async fn catalog(&self) -> Result<Vec<ProductRecord>, ProductError> {
        self.repo.list_products().await.map_err(ProductError::from)
    }

    pub async fn owned_by(&self, user_id: Uuid) -> Result<Vec<ProductRecord>, ProductError> {
        self.repo
            .list_products_by_user(user_id)
            .await
            .map_err(ProductError::from)
    }

    pub async fn add(&self, command: AddProductCommand) -> Result<ProductRecord, ProductError> {
        let title = command.title.trim().to_string();
        if title.is_empty() {
            return Err(ProductError::InvalidInput("Title must not be empty."));
        }
        let price = command
            .price
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite() && *value >= 0.0)
            .ok_or(ProductError::InvalidInput("Price must be a positive number."))?;

        let product = self
            .repo
            .create_product(CreateProductParams {
                title,
                price,
                description: command.description.trim().to_string(),
                image_url: command.image_url,
                user_id: command.user_id,
            })
            .await?;

        info!(
            target = "shopfront::products",
            product_id = %product.id,
            user_id = %product.user_id,
            "product created"
        );
        Ok(product)
    }
}
