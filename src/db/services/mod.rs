//! High-level store API over the entities: registry CRUD and check-result
//! persistence. All multi-row writes go through a single transaction so a
//! result and its error/sub-check rows are never partially visible.

pub mod result_service;
pub mod target_service;

pub use result_service::*;
pub use target_service::*;

use sea_orm::DbErr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] DbErr),
    #[error("a target with url '{0}' is already registered")]
    Conflict(String),
    #[error("target {0} not found")]
    NotFound(i32),
    #[error("invalid auth configuration: {0}")]
    InvalidAuth(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
