//! Registry service: CRUD for targets and their auth configuration.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use tracing::info;

use super::StoreError;
use crate::db::entities::{prelude::*, target};
use crate::db::enums::AuthConfig;

const DEFAULT_INTERVAL_SECONDS: i32 = 300;

/// Payload for registering a target.
#[derive(Debug, Clone)]
pub struct NewTarget {
    pub url: String,
    pub name: String,
    pub description: Option<String>,
    pub interval_seconds: Option<i32>,
    pub is_enabled: Option<bool>,
    pub auth: AuthConfig,
}

/// Partial update; `None` fields are left untouched. An incoming auth config
/// is merged against the stored one so blank secrets never erase stored ones.
#[derive(Debug, Clone, Default)]
pub struct UpdateTarget {
    pub name: Option<String>,
    pub description: Option<String>,
    pub interval_seconds: Option<i32>,
    pub is_enabled: Option<bool>,
    pub auth: Option<AuthConfig>,
}

/// Decodes the stored auth config of a target.
pub fn auth_config_of(model: &target::Model) -> Result<AuthConfig, StoreError> {
    serde_json::from_value(model.auth_config.clone()).map_err(StoreError::from)
}

pub async fn create_target(
    db: &DatabaseConnection,
    data: NewTarget,
) -> Result<target::Model, StoreError> {
    data.auth.validate().map_err(StoreError::InvalidAuth)?;

    let existing = Target::find()
        .filter(TargetColumn::Url.eq(data.url.as_str()))
        .one(db)
        .await?;
    if existing.is_some() {
        return Err(StoreError::Conflict(data.url));
    }

    let now = Utc::now();
    let saved = TargetActiveModel {
        url: Set(data.url),
        name: Set(data.name),
        description: Set(data.description),
        interval_seconds: Set(data.interval_seconds.unwrap_or(DEFAULT_INTERVAL_SECONDS)),
        is_enabled: Set(data.is_enabled.unwrap_or(true)),
        auth_config: Set(serde_json::to_value(&data.auth)?),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(target_id = saved.id, url = %saved.url, "target registered");
    Ok(saved)
}

pub async fn get_target(db: &DatabaseConnection, id: i32) -> Result<target::Model, StoreError> {
    Target::find_by_id(id)
        .one(db)
        .await?
        .ok_or(StoreError::NotFound(id))
}

/// Enabled targets in stable insertion order.
pub async fn list_enabled_targets(
    db: &DatabaseConnection,
) -> Result<Vec<target::Model>, StoreError> {
    Ok(Target::find()
        .filter(TargetColumn::IsEnabled.eq(true))
        .order_by_asc(TargetColumn::Id)
        .all(db)
        .await?)
}

pub async fn update_target(
    db: &DatabaseConnection,
    id: i32,
    payload: UpdateTarget,
) -> Result<target::Model, StoreError> {
    let existing = get_target(db, id).await?;
    let stored_auth = auth_config_of(&existing)?;

    let mut active: target::ActiveModel = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(interval) = payload.interval_seconds {
        active.interval_seconds = Set(interval);
    }
    if let Some(enabled) = payload.is_enabled {
        active.is_enabled = Set(enabled);
    }
    if let Some(incoming) = payload.auth {
        let merged = stored_auth.merged_with(incoming);
        merged.validate().map_err(StoreError::InvalidAuth)?;
        active.auth_config = Set(serde_json::to_value(&merged)?);
    }
    active.updated_at = Set(Utc::now());

    Ok(active.update(db).await?)
}

pub async fn set_enabled(
    db: &DatabaseConnection,
    id: i32,
    enabled: bool,
) -> Result<target::Model, StoreError> {
    update_target(
        db,
        id,
        UpdateTarget {
            is_enabled: Some(enabled),
            ..Default::default()
        },
    )
    .await
}

/// Hard delete with cascade. Child rows go first (error/iframe/video rows,
/// then results and latency samples, then the target itself) inside one
/// transaction, so no orphaned child records can ever be observed. The
/// ordering is a correctness invariant.
pub async fn delete_target(db: &DatabaseConnection, id: i32) -> Result<(), StoreError> {
    let txn = db.begin().await?;

    let target = Target::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or(StoreError::NotFound(id))?;

    let result_ids: Vec<i32> = CheckResult::find()
        .select_only()
        .column(CheckResultColumn::Id)
        .filter(CheckResultColumn::TargetId.eq(id))
        .into_tuple()
        .all(&txn)
        .await?;

    if !result_ids.is_empty() {
        CheckError::delete_many()
            .filter(CheckErrorColumn::CheckResultId.is_in(result_ids.clone()))
            .exec(&txn)
            .await?;
        IframeCheck::delete_many()
            .filter(IframeCheckColumn::CheckResultId.is_in(result_ids.clone()))
            .exec(&txn)
            .await?;
        VideoCheck::delete_many()
            .filter(VideoCheckColumn::CheckResultId.is_in(result_ids))
            .exec(&txn)
            .await?;
        CheckResult::delete_many()
            .filter(CheckResultColumn::TargetId.eq(id))
            .exec(&txn)
            .await?;
    }

    LatencySample::delete_many()
        .filter(LatencySampleColumn::TargetId.eq(id))
        .exec(&txn)
        .await?;

    target.delete(&txn).await?;
    txn.commit().await?;

    info!(target_id = id, "target deleted with all derived records");
    Ok(())
}
