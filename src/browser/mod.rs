//! Browser automation seam.
//!
//! The orchestration core only depends on the [`BrowserEngine`] /
//! [`BrowserSession`] traits; the concrete CDP wiring lives in
//! [`chrome`]. An engine is an expensive, stateful resource (one live
//! browser process), owned by the orchestrator and handed to the executor
//! explicitly. A session is one isolated tab: fresh per check, thrown away
//! afterwards, so no cookie or auth state bleeds across targets.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub mod auth;
pub mod chrome;
pub mod executor;

pub use executor::{CheckExecutor, CheckRequest};

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("failed to launch browser: {0}")]
    Launch(String),
    #[error("failed to open session: {0}")]
    Session(String),
    #[error("navigation to {url} timed out after {timeout_ms}ms")]
    NavigationTimeout { url: String, timeout_ms: u64 },
    #[error("navigation to {url} failed: {reason}")]
    NavigationFailed { url: String, reason: String },
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("browser driver error: {0}")]
    Driver(String),
}

impl BrowserError {
    pub fn kind(&self) -> CheckErrorKind {
        match self {
            BrowserError::AuthenticationFailed(_) => CheckErrorKind::Auth,
            _ => CheckErrorKind::Navigation,
        }
    }
}

/// Classification of a single structured check error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text", enum_name = "check_error_kind_enum")]
pub enum CheckErrorKind {
    #[sea_orm(string_value = "navigation")]
    Navigation,
    #[sea_orm(string_value = "console")]
    Console,
    #[sea_orm(string_value = "network")]
    Network,
    #[sea_orm(string_value = "auth")]
    Auth,
    #[sea_orm(string_value = "content")]
    Content,
}

impl fmt::Display for CheckErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CheckErrorKind::Navigation => "navigation",
            CheckErrorKind::Console => "console",
            CheckErrorKind::Network => "network",
            CheckErrorKind::Auth => "auth",
            CheckErrorKind::Content => "content",
        };
        f.write_str(s)
    }
}

/// One structured error observed during a check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawError {
    pub kind: CheckErrorKind,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl RawError {
    pub fn new(kind: CheckErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Main-document response facts, as observable from inside the page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageStats {
    pub http_status: Option<u16>,
    pub content_length: Option<u64>,
}

/// Load probe for one embedded iframe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IframeProbe {
    pub src: String,
    pub loaded: bool,
    pub error: Option<String>,
}

/// Playability probe for one embedded video element.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoProbe {
    pub src: String,
    pub ready_state: i32,
    pub network_state: i32,
    pub playable: bool,
    pub error: Option<String>,
}

/// Everything one check execution observed, before status derivation.
///
/// The errors list is non-empty whenever any step detected a problem; the
/// pass/fail verdict belongs to [`crate::status::derive`], not to the
/// executor.
#[derive(Debug, Clone)]
pub struct RawCheck {
    pub http_status: Option<u16>,
    pub response_time_ms: u64,
    pub content_length: Option<u64>,
    pub checked_at: DateTime<Utc>,
    pub errors: Vec<RawError>,
    pub iframes: Vec<IframeProbe>,
    pub videos: Vec<VideoProbe>,
    pub screenshot: Option<String>,
}

impl RawCheck {
    /// A check that never produced a page: one error, nothing else observed.
    pub fn failure(error: RawError, response_time_ms: u64) -> Self {
        Self {
            http_status: None,
            response_time_ms,
            content_length: None,
            checked_at: Utc::now(),
            errors: vec![error],
            iframes: Vec::new(),
            videos: Vec::new(),
            screenshot: None,
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Factory for isolated browser sessions. One engine wraps one live browser
/// process; checks against it are serialized by the orchestrator.
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    async fn new_session(&self) -> Result<Box<dyn BrowserSession>, BrowserError>;
}

/// One isolated page context. All operations are bounded by their caller's
/// timeout; implementations must not block past it by more than a grace
/// period.
#[async_trait]
pub trait BrowserSession: Send {
    /// Attach transport-level headers applied to subsequent navigations.
    async fn set_extra_headers(&mut self, headers: Vec<(String, String)>)
    -> Result<(), BrowserError>;

    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), BrowserError>;

    async fn current_url(&mut self) -> Result<String, BrowserError>;

    async fn click(&mut self, selector: &str) -> Result<(), BrowserError>;

    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), BrowserError>;

    /// Returns the first selector in `candidates` that matches an element on
    /// the current page, if any.
    async fn find_first(&mut self, candidates: &[String])
    -> Result<Option<String>, BrowserError>;

    /// Waits for `selector` to appear. `Ok(false)` means it never showed up
    /// within the timeout.
    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<bool, BrowserError>;

    /// HTTP status and content length of the main document.
    async fn page_stats(&mut self) -> Result<PageStats, BrowserError>;

    /// Drains console/network error entries collected since navigation.
    async fn drain_log_errors(&mut self) -> Vec<RawError>;

    async fn iframe_probes(&mut self) -> Result<Vec<IframeProbe>, BrowserError>;

    async fn video_probes(&mut self) -> Result<Vec<VideoProbe>, BrowserError>;

    /// PNG screenshot of the current viewport, for failure diagnostics.
    async fn screenshot(&mut self) -> Result<Vec<u8>, BrowserError>;

    /// Tears the session down. Dropping without closing must not leak the
    /// underlying tab forever, but closing eagerly is preferred.
    async fn close(&mut self);
}
