//! Orchestration: registry iteration, timing, concurrency policy, and batch
//! reporting.
//!
//! One orchestrator owns one browser engine and serializes all checks
//! through it; cross-target cookie/auth bleed is impossible because no two
//! checks ever share an in-flight session. Horizontal throughput means
//! running more orchestrator instances over disjoint target partitions, not
//! sharing one engine.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tracing::{error, info, warn};

pub mod schedule;

use crate::alerting::{AlertEvent, AlertSink};
use crate::browser::{CheckErrorKind, CheckExecutor, CheckRequest, RawCheck, RawError};
use crate::db::entities::target;
use crate::db::services::{self, StoreError};
use crate::notifications::NotificationSender;
use crate::status::{self, Status};

/// Slack on top of the per-check timeout before the orchestrator gives up on
/// the executor entirely.
const CHECK_TIMEOUT_GRACE: Duration = Duration::from_secs(5);

/// Per-target entry in a batch report: enough for a UI or alert sink to
/// render state without re-querying raw records.
#[derive(Debug, Clone, Serialize)]
pub struct TargetReport {
    pub target_id: i32,
    pub name: String,
    pub url: String,
    pub status: Status,
    pub http_status: Option<u16>,
    pub latency_ms: u64,
    pub checked_at: DateTime<Utc>,
    pub had_errors: bool,
    /// Set when the check itself could not run cleanly end-to-end (timeout,
    /// persistence failure, undecodable auth config).
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub reports: Vec<TargetReport>,
}

impl BatchReport {
    pub fn down_count(&self) -> usize {
        self.reports.iter().filter(|r| !r.status.is_up()).count()
    }
}

pub struct Orchestrator {
    db: DatabaseConnection,
    executor: CheckExecutor,
    /// At most one in-flight navigation per shared browser engine.
    engine_lock: Mutex<()>,
    alerts: AlertSink,
    senders: Vec<Arc<dyn NotificationSender>>,
    check_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        db: DatabaseConnection,
        executor: CheckExecutor,
        alerts: AlertSink,
        senders: Vec<Arc<dyn NotificationSender>>,
    ) -> Self {
        let check_timeout = executor.default_timeout();
        Self {
            db,
            executor,
            engine_lock: Mutex::new(()),
            alerts,
            senders,
            check_timeout,
        }
    }

    pub fn alerts(&self) -> &AlertSink {
        &self.alerts
    }

    /// Checks a single target by id; `NotFound` surfaces to the caller.
    pub async fn check_one(&self, target_id: i32) -> Result<TargetReport, StoreError> {
        let target = services::get_target(&self.db, target_id).await?;
        Ok(self.run_check(&target).await)
    }

    /// Checks every enabled target once. Every requested target appears in
    /// the report exactly once; one target's failure never aborts the batch.
    pub async fn check_all(&self) -> Result<BatchReport, StoreError> {
        let targets = services::list_enabled_targets(&self.db).await?;
        Ok(self.run_batch(targets).await)
    }

    /// Checks enabled targets whose own poll interval has elapsed since
    /// their last recorded check.
    pub async fn check_due(&self) -> Result<BatchReport, StoreError> {
        let now = Utc::now();
        let mut due = Vec::new();
        for target in services::list_enabled_targets(&self.db).await? {
            let last = services::latest_result(&self.db, target.id)
                .await?
                .map(|r| r.checked_at);
            let is_due = match last {
                None => true,
                Some(checked_at) => {
                    now.signed_duration_since(checked_at).num_seconds()
                        >= i64::from(target.interval_seconds)
                }
            };
            if is_due {
                due.push(target);
            }
        }
        Ok(self.run_batch(due).await)
    }

    async fn run_batch(&self, targets: Vec<target::Model>) -> BatchReport {
        let started_at = Utc::now();
        let mut reports = Vec::with_capacity(targets.len());
        for target in &targets {
            reports.push(self.run_check(target).await);
        }
        let report = BatchReport {
            started_at,
            finished_at: Utc::now(),
            reports,
        };
        info!(
            targets = report.reports.len(),
            down = report.down_count(),
            "batch finished"
        );
        report
    }

    /// Runs one check end to end: auth + navigation + signal collection,
    /// derivation, persistence, alerting. Failure modes end up inside the
    /// returned report, never as an early return.
    async fn run_check(&self, target: &target::Model) -> TargetReport {
        let raw = match services::auth_config_of(target) {
            Ok(auth) => {
                let request = CheckRequest {
                    url: target.url.clone(),
                    auth,
                };
                self.execute_with_timeout(&request).await
            }
            Err(e) => {
                error!(target_id = target.id, error = %e, "stored auth config is invalid");
                RawCheck::failure(
                    RawError::new(CheckErrorKind::Auth, format!("invalid auth config: {e}")),
                    0,
                )
            }
        };

        let previous = match services::previous_status(&self.db, target.id).await {
            Ok(previous) => previous,
            Err(e) => {
                warn!(target_id = target.id, error = %e, "could not load previous status");
                None
            }
        };

        let derivation = status::derive(previous, &raw);

        let mut report = TargetReport {
            target_id: target.id,
            name: target.name.clone(),
            url: target.url.clone(),
            status: derivation.status,
            http_status: raw.http_status,
            latency_ms: raw.response_time_ms,
            checked_at: raw.checked_at,
            had_errors: raw.has_errors(),
            error: None,
        };
        if let Some(first) = raw.errors.first() {
            if matches!(first.kind, CheckErrorKind::Navigation | CheckErrorKind::Auth) {
                report.error = Some(first.message.clone());
            }
        }

        if let Err(e) = services::record_check(&self.db, target.id, derivation.status, &raw).await
        {
            // Fatal to this check's record only; the batch moves on.
            error!(target_id = target.id, error = %e, "failed to persist check result");
            report.error = Some(format!("persistence failure: {e}"));
        }

        if derivation.alert {
            let event = AlertEvent {
                target_id: target.id,
                name: target.name.clone(),
                old_status: previous,
                new_status: derivation.status,
                timestamp: raw.checked_at,
            };
            self.alerts.emit(event.clone());
            self.notify(&event).await;
        }

        report
    }

    /// Serializes the check through the shared engine and bounds it with a
    /// hard timeout so a wedged navigation cannot block the batch forever.
    async fn execute_with_timeout(&self, request: &CheckRequest) -> RawCheck {
        let _guard = self.engine_lock.lock().await;
        let timeout = self.check_timeout;
        match tokio::time::timeout(
            timeout + CHECK_TIMEOUT_GRACE,
            self.executor.check(request, Some(timeout)),
        )
        .await
        {
            Ok(raw) => raw,
            Err(_) => {
                warn!(url = %request.url, timeout_ms = timeout.as_millis() as u64, "check timed out");
                RawCheck::failure(
                    RawError::new(
                        CheckErrorKind::Navigation,
                        format!("check timed out after {}ms", timeout.as_millis()),
                    ),
                    timeout.as_millis() as u64,
                )
            }
        }
    }

    async fn notify(&self, event: &AlertEvent) {
        if self.senders.is_empty() {
            return;
        }
        let mut context = HashMap::new();
        context.insert("target_id".to_string(), event.target_id.to_string());
        context.insert("name".to_string(), event.name.clone());
        context.insert(
            "old_status".to_string(),
            event
                .old_status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "NONE".to_string()),
        );
        context.insert("new_status".to_string(), event.new_status.to_string());
        context.insert("timestamp".to_string(), event.timestamp.to_rfc3339());

        let message = event.summary();
        for sender in &self.senders {
            if let Err(e) = sender.send(&message, &context).await {
                // Delivery is best-effort; never unwinds orchestration.
                error!(error = %e, "alert notification failed");
            }
        }
    }

    /// Interval mode: every `tick`, run all targets whose own interval has
    /// elapsed. The sleep is cancellable; an in-flight batch completes
    /// before shutdown takes effect.
    pub async fn run_interval(
        self: Arc<Self>,
        tick: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(tick_seconds = tick.as_secs(), "interval scheduler started");
        loop {
            if let Err(e) = self.check_due().await {
                error!(error = %e, "batch run failed");
            }
            tokio::select! {
                _ = tokio::time::sleep(tick) => {}
                _ = shutdown.changed() => {
                    info!("interval scheduler stopping");
                    return;
                }
            }
        }
    }

    /// Wall-clock mode: run a full batch at the configured hours of day in
    /// `tz`. The delay is recomputed from `now` after every batch, so sleep
    /// error never accumulates.
    pub async fn run_at_hours(
        self: Arc<Self>,
        hours: Vec<u32>,
        tz: Tz,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(?hours, timezone = %tz, "wall-clock scheduler started");
        loop {
            let now = Utc::now().with_timezone(&tz);
            let Some(next) = schedule::next_run_at(&now, &hours) else {
                error!("no valid scheduled hours configured; scheduler exiting");
                return;
            };
            let wait = (next.clone() - now)
                .to_std()
                .unwrap_or(Duration::ZERO);
            info!(next_run = %next, "sleeping until next scheduled batch");
            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    if let Err(e) = self.check_all().await {
                        error!(error = %e, "scheduled batch failed");
                    }
                }
                _ = shutdown.changed() => {
                    info!("wall-clock scheduler stopping");
                    return;
                }
            }
        }
    }
}
