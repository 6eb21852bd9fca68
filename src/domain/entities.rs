//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductRecord {
    pub id: Uuid,
    pub title: String,
    pub price: f64,
    pub description: String,
    pub image_url: String,
    pub user_id: Uuid,
    pub created_at: OffsetDateTime,
}
