//! Browser check executor: drives one session through auth, navigation and
//! signal collection for a single target.
//!
//! The executor never decides pass/fail. It reports everything it observed in
//! a [`RawCheck`] and leaves the verdict to [`crate::status::derive`]. Errors
//! local to the check become entries in the raw errors list instead of
//! propagating.

use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{
    BrowserEngine, BrowserSession, CheckErrorKind, RawCheck, RawError, auth,
};
use crate::db::enums::AuthConfig;

/// What the orchestrator hands over per check: just the URL and the auth
/// strategy, decoded from the registry row.
#[derive(Debug, Clone)]
pub struct CheckRequest {
    pub url: String,
    pub auth: AuthConfig,
}

pub struct CheckExecutor {
    engine: Arc<dyn BrowserEngine>,
    default_timeout: Duration,
    /// Failure screenshots land here; `None` disables capture entirely.
    screenshot_dir: Option<PathBuf>,
}

impl CheckExecutor {
    pub fn new(
        engine: Arc<dyn BrowserEngine>,
        default_timeout: Duration,
        screenshot_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            engine,
            default_timeout,
            screenshot_dir,
        }
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Runs one full check. `timeout_override` bounds the navigation and all
    /// waits; without it the executor default applies.
    pub async fn check(&self, request: &CheckRequest, timeout_override: Option<Duration>) -> RawCheck {
        let timeout = timeout_override.unwrap_or(self.default_timeout);
        let started = Instant::now();

        let mut session = match self.engine.new_session().await {
            Ok(session) => session,
            Err(e) => {
                warn!(url = %request.url, error = %e, "could not open browser session");
                return RawCheck::failure(
                    RawError::new(e.kind(), e.to_string()),
                    started.elapsed().as_millis() as u64,
                );
            }
        };

        let raw = self.run_check(session.as_mut(), request, timeout, started).await;
        session.close().await;
        raw
    }

    async fn run_check(
        &self,
        session: &mut dyn BrowserSession,
        request: &CheckRequest,
        timeout: Duration,
        started: Instant,
    ) -> RawCheck {
        if let Err(e) = auth::authenticate(session, &request.auth, timeout).await {
            // Authentication did not reach its success criteria; do not load
            // the target URL unauthenticated.
            debug!(url = %request.url, error = %e, "auth flow failed, skipping target");
            return RawCheck::failure(
                RawError::new(CheckErrorKind::Auth, e.to_string()),
                started.elapsed().as_millis() as u64,
            );
        }

        let mut raw = RawCheck {
            http_status: None,
            response_time_ms: 0,
            content_length: None,
            checked_at: Utc::now(),
            errors: Vec::new(),
            iframes: Vec::new(),
            videos: Vec::new(),
            screenshot: None,
        };

        let nav_started = Instant::now();
        if let Err(e) = session.navigate(&request.url, timeout).await {
            raw.response_time_ms = nav_started.elapsed().as_millis() as u64;
            raw.errors.push(RawError::new(e.kind(), e.to_string()));
            raw.screenshot = self.capture_failure_screenshot(session, &request.url).await;
            return raw;
        }
        raw.response_time_ms = nav_started.elapsed().as_millis() as u64;

        match session.page_stats().await {
            Ok(stats) => {
                raw.http_status = stats.http_status;
                raw.content_length = stats.content_length;
            }
            Err(e) => debug!(url = %request.url, error = %e, "page stats unavailable"),
        }

        raw.errors.extend(session.drain_log_errors().await);

        match session.iframe_probes().await {
            Ok(probes) => {
                for probe in probes.iter().filter(|p| !p.loaded) {
                    raw.errors.push(
                        RawError::new(
                            CheckErrorKind::Content,
                            format!(
                                "iframe '{}' failed to load: {}",
                                probe.src,
                                probe.error.as_deref().unwrap_or("unknown reason")
                            ),
                        )
                        .with_details(serde_json::json!({ "src": probe.src })),
                    );
                }
                raw.iframes = probes;
            }
            Err(e) => debug!(url = %request.url, error = %e, "iframe probe failed"),
        }

        match session.video_probes().await {
            Ok(probes) => {
                for probe in probes.iter().filter(|v| !v.playable) {
                    raw.errors.push(
                        RawError::new(
                            CheckErrorKind::Content,
                            format!(
                                "video '{}' not playable (readyState={}, networkState={})",
                                probe.src, probe.ready_state, probe.network_state
                            ),
                        )
                        .with_details(serde_json::json!({ "src": probe.src })),
                    );
                }
                raw.videos = probes;
            }
            Err(e) => debug!(url = %request.url, error = %e, "video probe failed"),
        }

        if let Some(code) = raw.http_status {
            if !(200..400).contains(&code) {
                raw.errors.push(RawError::new(
                    CheckErrorKind::Navigation,
                    format!("main document returned HTTP {code}"),
                ));
                raw.screenshot = self.capture_failure_screenshot(session, &request.url).await;
            }
        }

        raw
    }

    /// Best-effort diagnostics capture; never fails the check.
    async fn capture_failure_screenshot(
        &self,
        session: &mut dyn BrowserSession,
        url: &str,
    ) -> Option<String> {
        let dir = self.screenshot_dir.as_ref()?;
        let png = match session.screenshot().await {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(url, error = %e, "screenshot capture failed");
                return None;
            }
        };
        if let Err(e) = std::fs::create_dir_all(dir) {
            warn!(dir = %dir.display(), error = %e, "could not create screenshot directory");
            return None;
        }
        let file = dir.join(format!(
            "{}-{}.png",
            sanitize_for_filename(url),
            Utc::now().timestamp_millis()
        ));
        match std::fs::write(&file, png) {
            Ok(()) => Some(file.to_string_lossy().into_owned()),
            Err(e) => {
                warn!(file = %file.display(), error = %e, "could not write screenshot");
                None
            }
        }
    }
}

fn sanitize_for_filename(url: &str) -> String {
    url.trim_start_matches("https://")
        .trim_start_matches("http://")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .take(64)
        .collect()
}
