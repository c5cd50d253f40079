//! `headless_chrome` implementation of the browser seam.
//!
//! One [`ChromeEngine`] wraps one Chrome process; every session is a fresh
//! tab that is closed after its check, so cookies and storage never survive
//! between targets. The CDP client is blocking, so every call is bridged
//! through `spawn_blocking`.

use headless_chrome::protocol::cdp::Log::{LogEntryLevel, LogEntrySource};
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::protocol::cdp::types::Event;
use headless_chrome::{Browser, LaunchOptions, Tab};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

use super::{
    BrowserEngine, BrowserError, BrowserSession, CheckErrorKind, IframeProbe, PageStats, RawError,
    VideoProbe,
};

/// Keep the browser alive between widely spaced batches; the crate default
/// kills an idle browser after 30 seconds.
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(86_400);

const PAGE_STATS_JS: &str = r#"
JSON.stringify((() => {
  const nav = performance.getEntriesByType('navigation')[0];
  if (!nav) return { status: null, length: null };
  const status = nav.responseStatus && nav.responseStatus > 0 ? nav.responseStatus : null;
  const length = nav.decodedBodySize && nav.decodedBodySize > 0
    ? nav.decodedBodySize
    : (document.documentElement ? document.documentElement.outerHTML.length : null);
  return { status, length };
})())
"#;

const IFRAME_PROBE_JS: &str = r#"
JSON.stringify(Array.from(document.querySelectorAll('iframe')).map((frame) => {
  const src = frame.src || '';
  let loaded = true;
  let error = null;
  try {
    const doc = frame.contentDocument;
    if (doc && doc.readyState !== 'complete') {
      loaded = false;
      error = 'iframe document not complete';
    }
  } catch (_) {
    // Cross-origin frames are opaque; fall through to resource timing.
  }
  if (src) {
    const entry = performance.getEntriesByType('resource').find((r) => r.name === src);
    if (entry && entry.responseStatus >= 400) {
      loaded = false;
      error = 'HTTP ' + entry.responseStatus;
    }
  }
  return { src, loaded, error };
}))
"#;

const VIDEO_PROBE_JS: &str = r#"
JSON.stringify(Array.from(document.querySelectorAll('video')).map((video) => ({
  src: video.currentSrc || video.src || '',
  ready_state: video.readyState,
  network_state: video.networkState,
  playable: video.readyState >= 2 && video.networkState !== 3 && !video.error,
  error: video.error ? ('media error code ' + video.error.code) : null,
})))
"#;

pub struct ChromeEngine {
    browser: Browser,
}

impl ChromeEngine {
    /// Launches a headless Chrome process. Expensive; the orchestrator holds
    /// exactly one engine and serializes checks through it.
    pub async fn launch() -> Result<Self, BrowserError> {
        let browser = tokio::task::spawn_blocking(|| {
            let options = LaunchOptions::default_builder()
                .headless(true)
                .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
                .build()
                .map_err(|e| BrowserError::Launch(e.to_string()))?;
            Browser::new(options).map_err(|e| BrowserError::Launch(e.to_string()))
        })
        .await
        .map_err(|e| BrowserError::Launch(format!("launch task failed: {e}")))??;

        Ok(Self { browser })
    }
}

#[async_trait]
impl BrowserEngine for ChromeEngine {
    async fn new_session(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
        let browser = self.browser.clone();
        let session = tokio::task::spawn_blocking(move || {
            let tab = browser
                .new_tab()
                .map_err(|e| BrowserError::Session(e.to_string()))?;
            let log_errors: Arc<Mutex<Vec<RawError>>> = Arc::new(Mutex::new(Vec::new()));

            // Chrome's Log domain reports both console errors and failed
            // subresource loads; collect error-level entries as they arrive.
            tab.enable_log()
                .map_err(|e| BrowserError::Session(e.to_string()))?;
            let sink = Arc::clone(&log_errors);
            tab.add_event_listener(Arc::new(move |event: &Event| {
                if let Event::LogEntryAdded(added) = event {
                    let entry = &added.params.entry;
                    if !matches!(entry.level, LogEntryLevel::Error) {
                        return;
                    }
                    let kind = if matches!(entry.source, LogEntrySource::Network) {
                        CheckErrorKind::Network
                    } else {
                        CheckErrorKind::Console
                    };
                    let mut error = RawError::new(kind, entry.text.clone());
                    if let Some(url) = &entry.url {
                        error = error.with_details(serde_json::json!({ "url": url }));
                    }
                    if let Ok(mut sink) = sink.lock() {
                        sink.push(error);
                    }
                }
            }))
            .map_err(|e| BrowserError::Session(e.to_string()))?;

            Ok::<_, BrowserError>(ChromeSession {
                tab,
                log_errors,
                closed: false,
            })
        })
        .await
        .map_err(|e| BrowserError::Session(format!("session task failed: {e}")))??;

        Ok(Box::new(session))
    }
}

pub struct ChromeSession {
    tab: Arc<Tab>,
    log_errors: Arc<Mutex<Vec<RawError>>>,
    closed: bool,
}

impl ChromeSession {
    async fn blocking<T, F>(&self, op: F) -> Result<T, BrowserError>
    where
        T: Send + 'static,
        F: FnOnce(Arc<Tab>) -> Result<T, BrowserError> + Send + 'static,
    {
        let tab = Arc::clone(&self.tab);
        tokio::task::spawn_blocking(move || op(tab))
            .await
            .map_err(|e| BrowserError::Driver(format!("browser task failed: {e}")))?
    }
}

fn driver_error(e: impl std::fmt::Display) -> BrowserError {
    BrowserError::Driver(e.to_string())
}

/// Runs a JS expression that returns a JSON string and deserializes it.
fn eval_json<T: serde::de::DeserializeOwned>(tab: &Tab, expr: &str) -> Result<T, BrowserError> {
    let object = tab.evaluate(expr, false).map_err(driver_error)?;
    let value = object
        .value
        .ok_or_else(|| BrowserError::Driver("probe script returned no value".into()))?;
    let json = value
        .as_str()
        .ok_or_else(|| BrowserError::Driver("probe script returned a non-string".into()))?;
    serde_json::from_str(json)
        .map_err(|e| BrowserError::Driver(format!("malformed probe payload: {e}")))
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn set_extra_headers(
        &mut self,
        headers: Vec<(String, String)>,
    ) -> Result<(), BrowserError> {
        self.blocking(move |tab| {
            let map: HashMap<&str, &str> = headers
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect();
            tab.set_extra_http_headers(map).map_err(driver_error)
        })
        .await
    }

    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        let url = url.to_string();
        self.blocking(move |tab| {
            tab.set_default_timeout(timeout);
            let navigated = tab
                .navigate_to(&url)
                .and_then(|tab| tab.wait_until_navigated());
            match navigated {
                Ok(_) => Ok(()),
                Err(e) => {
                    let reason = e.to_string();
                    if reason.to_lowercase().contains("time") {
                        Err(BrowserError::NavigationTimeout {
                            url,
                            timeout_ms: timeout.as_millis() as u64,
                        })
                    } else {
                        Err(BrowserError::NavigationFailed { url, reason })
                    }
                }
            }
        })
        .await
    }

    async fn current_url(&mut self) -> Result<String, BrowserError> {
        self.blocking(move |tab| Ok(tab.get_url())).await
    }

    async fn click(&mut self, selector: &str) -> Result<(), BrowserError> {
        let selector = selector.to_string();
        self.blocking(move |tab| {
            tab.find_element(&selector)
                .and_then(|el| el.click().map(|_| ()))
                .map_err(driver_error)
        })
        .await
    }

    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), BrowserError> {
        let selector = selector.to_string();
        let value = value.to_string();
        self.blocking(move |tab| {
            tab.find_element(&selector)
                .and_then(|el| el.click().and_then(|_| el.type_into(&value)).map(|_| ()))
                .map_err(driver_error)
        })
        .await
    }

    async fn find_first(
        &mut self,
        candidates: &[String],
    ) -> Result<Option<String>, BrowserError> {
        let candidates = candidates.to_vec();
        self.blocking(move |tab| {
            for selector in candidates {
                if tab.find_element(&selector).is_ok() {
                    return Ok(Some(selector));
                }
            }
            Ok(None)
        })
        .await
    }

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<bool, BrowserError> {
        let selector = selector.to_string();
        self.blocking(move |tab| {
            Ok(tab
                .wait_for_element_with_custom_timeout(&selector, timeout)
                .is_ok())
        })
        .await
    }

    async fn page_stats(&mut self) -> Result<PageStats, BrowserError> {
        #[derive(serde::Deserialize)]
        struct Stats {
            status: Option<u16>,
            length: Option<u64>,
        }
        let stats: Stats = self
            .blocking(move |tab| eval_json(&tab, PAGE_STATS_JS))
            .await?;
        Ok(PageStats {
            http_status: stats.status,
            content_length: stats.length,
        })
    }

    async fn drain_log_errors(&mut self) -> Vec<RawError> {
        match self.log_errors.lock() {
            Ok(mut entries) => std::mem::take(&mut *entries),
            Err(e) => {
                warn!(error = %e, "log error sink poisoned");
                Vec::new()
            }
        }
    }

    async fn iframe_probes(&mut self) -> Result<Vec<IframeProbe>, BrowserError> {
        self.blocking(move |tab| eval_json(&tab, IFRAME_PROBE_JS))
            .await
    }

    async fn video_probes(&mut self) -> Result<Vec<VideoProbe>, BrowserError> {
        self.blocking(move |tab| eval_json(&tab, VIDEO_PROBE_JS))
            .await
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, BrowserError> {
        self.blocking(move |tab| {
            tab.capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
                .map_err(driver_error)
        })
        .await
    }

    async fn close(&mut self) {
        self.closed = true;
        let tab = Arc::clone(&self.tab);
        let closed = tokio::task::spawn_blocking(move || tab.close(true)).await;
        match closed {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => debug!(error = %e, "tab close reported an error"),
            Err(e) => debug!(error = %e, "tab close task failed"),
        }
    }
}

impl Drop for ChromeSession {
    /// A cancelled check drops its session without reaching `close()`; the
    /// tab must not outlive the session, or every timed-out check leaks one
    /// for the life of the browser process.
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let tab = Arc::clone(&self.tab);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || {
                    let _ = tab.close(true);
                });
            }
            Err(_) => {
                let _ = tab.close(true);
            }
        }
    }
}
