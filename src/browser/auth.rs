//! Auth flow engine: runs one login strategy against a browser session
//! before the health check proceeds.
//!
//! Header-based strategies (`Basic`, `Token`, `Header`) attach credentials at
//! the transport level and never touch the page. `BrowserLogin` scripts the
//! full form flow and is redone from scratch for every check that needs it;
//! authenticated state never survives a session, so it cannot bleed across
//! targets.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use super::{BrowserError, BrowserSession};
use crate::db::enums::{AuthConfig, BrowserLoginConfig, LoginType};

/// Field-heuristic fallbacks used when no selector is configured.
const USERNAME_SELECTOR_FALLBACKS: &[&str] = &[
    "input[name='username']",
    "input[name='email']",
    "input[type='email']",
    "input[name='user']",
    "input[type='text']",
];

const PASSWORD_SELECTOR_FALLBACKS: &[&str] = &["input[type='password']", "input[name='password']"];

const SUBMIT_SELECTOR_FALLBACKS: &[&str] =
    &["button[type='submit']", "input[type='submit']", "form button"];

const LOGIN_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Authenticates the session for `target_url` according to `auth`.
///
/// Returns `Ok(())` when the check may proceed. Any failure comes back as
/// [`BrowserError::AuthenticationFailed`], which the executor records as an
/// auth error and which aborts the check before the target URL is ever
/// loaded.
pub async fn authenticate(
    session: &mut dyn BrowserSession,
    auth: &AuthConfig,
    timeout: Duration,
) -> Result<(), BrowserError> {
    match auth {
        AuthConfig::None => Ok(()),
        AuthConfig::Basic { username, password } => {
            let encoded = BASE64.encode(format!("{username}:{password}"));
            session
                .set_extra_headers(vec![("Authorization".into(), format!("Basic {encoded}"))])
                .await
        }
        AuthConfig::Token { token } => {
            session
                .set_extra_headers(vec![("Authorization".into(), format!("Bearer {token}"))])
                .await
        }
        AuthConfig::Header { name, value } => {
            session
                .set_extra_headers(vec![(name.clone(), value.clone())])
                .await
        }
        AuthConfig::BrowserLogin(cfg) => browser_login(session, cfg, timeout).await,
    }
}

async fn browser_login(
    session: &mut dyn BrowserSession,
    cfg: &BrowserLoginConfig,
    timeout: Duration,
) -> Result<(), BrowserError> {
    debug!(login_url = %cfg.login_url, login_type = %cfg.login_type, "starting browser login");

    session
        .navigate(&cfg.login_url, timeout)
        .await
        .map_err(|e| auth_failure("login page unreachable", e))?;

    if cfg.login_type == LoginType::Modal {
        // Validated at construction: Modal always carries a trigger selector.
        let trigger = cfg
            .modal_trigger_selector
            .as_deref()
            .ok_or_else(|| BrowserError::AuthenticationFailed("missing modal trigger".into()))?;
        session
            .click(trigger)
            .await
            .map_err(|e| auth_failure("modal trigger not clickable", e))?;
    }

    let username_selector = resolve_selector(
        session,
        cfg.username_selector.as_deref(),
        USERNAME_SELECTOR_FALLBACKS,
        "username field",
    )
    .await?;
    let password_selector = resolve_selector(
        session,
        cfg.password_selector.as_deref(),
        PASSWORD_SELECTOR_FALLBACKS,
        "password field",
    )
    .await?;

    session
        .fill(&username_selector, &cfg.username)
        .await
        .map_err(|e| auth_failure("could not fill username", e))?;
    session
        .fill(&password_selector, &cfg.password)
        .await
        .map_err(|e| auth_failure("could not fill password", e))?;

    let submit_selector = resolve_selector(
        session,
        cfg.submit_selector.as_deref(),
        SUBMIT_SELECTOR_FALLBACKS,
        "submit control",
    )
    .await?;
    session
        .click(&submit_selector)
        .await
        .map_err(|e| auth_failure("could not submit login form", e))?;

    match cfg.success_selector.as_deref() {
        Some(selector) => {
            let appeared = session
                .wait_for_selector(selector, timeout)
                .await
                .map_err(|e| auth_failure("waiting for success selector", e))?;
            if appeared {
                Ok(())
            } else {
                Err(BrowserError::AuthenticationFailed(format!(
                    "success selector '{selector}' did not appear within {}ms",
                    timeout.as_millis()
                )))
            }
        }
        None => wait_for_navigation_away(session, &cfg.login_url, timeout).await,
    }
}

/// Picks the configured selector, or the first fallback matching an element.
async fn resolve_selector(
    session: &mut dyn BrowserSession,
    configured: Option<&str>,
    fallbacks: &[&str],
    what: &str,
) -> Result<String, BrowserError> {
    if let Some(selector) = configured {
        return Ok(selector.to_string());
    }
    let candidates: Vec<String> = fallbacks.iter().map(|s| s.to_string()).collect();
    session
        .find_first(&candidates)
        .await
        .map_err(|e| auth_failure(what, e))?
        .ok_or_else(|| BrowserError::AuthenticationFailed(format!("no {what} found on login page")))
}

/// Success criterion when no selector is configured: the session leaves the
/// login URL within the timeout.
async fn wait_for_navigation_away(
    session: &mut dyn BrowserSession,
    login_url: &str,
    timeout: Duration,
) -> Result<(), BrowserError> {
    let deadline = Instant::now() + timeout;
    let login_url = login_url.trim_end_matches('/');
    loop {
        let current = session
            .current_url()
            .await
            .map_err(|e| auth_failure("reading current url", e))?;
        if current.trim_end_matches('/') != login_url {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(BrowserError::AuthenticationFailed(format!(
                "still on login page after {}ms",
                timeout.as_millis()
            )));
        }
        tokio::time::sleep(LOGIN_POLL_INTERVAL).await;
    }
}

fn auth_failure(context: &str, source: BrowserError) -> BrowserError {
    match source {
        already @ BrowserError::AuthenticationFailed(_) => already,
        other => BrowserError::AuthenticationFailed(format!("{context}: {other}")),
    }
}
