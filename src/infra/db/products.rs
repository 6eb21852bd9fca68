use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{CreateProductParams, ProductsRepo, RepoError},
    domain::entities::ProductRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    title: String,
    price: f64,
    description: String,
    image_url: String,
    user_id: Uuid,
    created_at: OffsetDateTime,
}

impl From<ProductRow> for ProductRecord {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            price: row.price,
            description: row.description,
            image_url: row.image_url,
            user_id: row.user_id,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl ProductsRepo for PostgresRepositories {
    async fn list_products(&self) -> Result<Vec<ProductRecord>, RepoError> {
        let rows = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT id, title, price, description, image_url, user_id, created_at
            FROM products
            ORDER BY created_at DESC, id
            "#,
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(ProductRecord::from).collect())
    }

    async fn list_products_by_user(&self, user_id: Uuid) -> Result<Vec<ProductRecord>, RepoError> {
        let rows = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT id, title, price, description, image_url, user_id, created_at
            FROM products
            WHERE user_id = $1
            ORDER BY created_at DESC, id
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(ProductRecord::from).collect())
    }

    async fn create_product(
        &self,
        params: CreateProductParams,
    ) -> Result<ProductRecord, RepoError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r#"
            INSERT INTO products (id, title, price, description, image_url, user_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, title, price, description, image_url, user_id, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&params.title)
        .bind(params.price)
        .bind(&params.description)
        .bind(&params.image_url)
        .bind(params.user_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(ProductRecord::from(row))
    }
}
