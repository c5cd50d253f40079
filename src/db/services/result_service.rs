//! Check-result persistence: atomic writes of a result with its error and
//! sub-check rows, plus the capped latency trend window.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};

use super::StoreError;
use crate::browser::RawCheck;
use crate::db::entities::{check_result, prelude::*};
use crate::status::Status;

/// Sliding-window capacity for latency samples per target.
pub const LATENCY_WINDOW: usize = 20;

/// Persists one check outcome as a unit: the result row, its error and
/// iframe/video sub-check rows, and one latency sample (evicting the oldest
/// samples beyond the window) all commit in a single transaction.
pub async fn record_check(
    db: &DatabaseConnection,
    target_id: i32,
    status: Status,
    raw: &RawCheck,
) -> Result<check_result::Model, StoreError> {
    let txn = db.begin().await?;

    let result = CheckResultActiveModel {
        target_id: Set(target_id),
        status: Set(status),
        http_status: Set(raw.http_status.map(i32::from)),
        response_time_ms: Set(raw.response_time_ms as i64),
        content_length: Set(raw.content_length.map(|v| v as i64)),
        checked_at: Set(raw.checked_at),
        screenshot: Set(raw.screenshot.clone()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    if !raw.errors.is_empty() {
        let rows = raw.errors.iter().map(|e| CheckErrorActiveModel {
            check_result_id: Set(result.id),
            kind: Set(e.kind),
            message: Set(e.message.clone()),
            details: Set(e.details.clone()),
            ..Default::default()
        });
        CheckError::insert_many(rows).exec(&txn).await?;
    }

    if !raw.iframes.is_empty() {
        let rows = raw.iframes.iter().map(|f| IframeCheckActiveModel {
            check_result_id: Set(result.id),
            src: Set(f.src.clone()),
            loaded: Set(f.loaded),
            error: Set(f.error.clone()),
            ..Default::default()
        });
        IframeCheck::insert_many(rows).exec(&txn).await?;
    }

    if !raw.videos.is_empty() {
        let rows = raw.videos.iter().map(|v| VideoCheckActiveModel {
            check_result_id: Set(result.id),
            src: Set(v.src.clone()),
            ready_state: Set(v.ready_state),
            network_state: Set(v.network_state),
            playable: Set(v.playable),
            error: Set(v.error.clone()),
            ..Default::default()
        });
        VideoCheck::insert_many(rows).exec(&txn).await?;
    }

    LatencySampleActiveModel {
        target_id: Set(target_id),
        latency_ms: Set(raw.response_time_ms as i64),
        recorded_at: Set(raw.checked_at),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    // Evict everything past the newest LATENCY_WINDOW samples. SQLite does
    // not accept OFFSET without LIMIT, so rank newest-first and skip the
    // window in Rust; the per-target sample count is bounded by the window
    // anyway.
    let sample_ids: Vec<i32> = LatencySample::find()
        .select_only()
        .column(LatencySampleColumn::Id)
        .filter(LatencySampleColumn::TargetId.eq(target_id))
        .order_by_desc(LatencySampleColumn::RecordedAt)
        .order_by_desc(LatencySampleColumn::Id)
        .into_tuple()
        .all(&txn)
        .await?;
    let stale_ids: Vec<i32> = sample_ids.into_iter().skip(LATENCY_WINDOW).collect();
    if !stale_ids.is_empty() {
        LatencySample::delete_many()
            .filter(LatencySampleColumn::Id.is_in(stale_ids))
            .exec(&txn)
            .await?;
    }

    txn.commit().await?;
    Ok(result)
}

/// Latest persisted result for a target, if any.
pub async fn latest_result(
    db: &DatabaseConnection,
    target_id: i32,
) -> Result<Option<check_result::Model>, StoreError> {
    Ok(CheckResult::find()
        .filter(CheckResultColumn::TargetId.eq(target_id))
        .order_by_desc(CheckResultColumn::CheckedAt)
        .order_by_desc(CheckResultColumn::Id)
        .one(db)
        .await?)
}

/// Status carried by the latest result; the "previous status" input to
/// derivation. Not stored anywhere else.
pub async fn previous_status(
    db: &DatabaseConnection,
    target_id: i32,
) -> Result<Option<Status>, StoreError> {
    Ok(latest_result(db, target_id).await?.map(|r| r.status))
}

/// Bounded recent-results listing, newest first.
pub async fn recent_results(
    db: &DatabaseConnection,
    target_id: i32,
    limit: u64,
) -> Result<Vec<check_result::Model>, StoreError> {
    Ok(CheckResult::find()
        .filter(CheckResultColumn::TargetId.eq(target_id))
        .order_by_desc(CheckResultColumn::CheckedAt)
        .order_by_desc(CheckResultColumn::Id)
        .limit(limit)
        .all(db)
        .await?)
}

/// Latency trend window, oldest sample first. Never longer than
/// [`LATENCY_WINDOW`].
pub async fn latency_history(
    db: &DatabaseConnection,
    target_id: i32,
) -> Result<Vec<i64>, StoreError> {
    let samples: Vec<i64> = LatencySample::find()
        .select_only()
        .column(LatencySampleColumn::LatencyMs)
        .filter(LatencySampleColumn::TargetId.eq(target_id))
        .order_by_asc(LatencySampleColumn::RecordedAt)
        .order_by_asc(LatencySampleColumn::Id)
        .into_tuple()
        .all(db)
        .await?;
    Ok(samples)
}
