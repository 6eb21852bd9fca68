//! Application services layer.

pub mod auth;
pub mod csrf;
pub mod current_user;
pub mod error;
pub mod products;
pub mod repos;
