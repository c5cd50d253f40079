//! Shared domain enums stored alongside targets.
//!
//! `AuthConfig` is an explicit tagged variant instead of a flat struct with
//! optional fields keyed by a type string: construction-time validation
//! rejects fields that are illegal for the active tag, so a config can never
//! carry both a token and a username "and hope one is ignored".

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a `BrowserLogin` flow reaches its form: a dedicated login page, or a
/// modal opened from the target page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LoginType {
    Page,
    Modal,
}

impl fmt::Display for LoginType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoginType::Page => f.write_str("PAGE"),
            LoginType::Modal => f.write_str("MODAL"),
        }
    }
}

/// Scripted login flow configuration for `AuthConfig::BrowserLogin`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserLoginConfig {
    pub login_url: String,
    pub login_type: LoginType,
    /// Only meaningful for `Modal`; clicking it opens the login form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modal_trigger_selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submit_selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_selector: Option<String>,
    pub username: String,
    pub password: String,
}

/// Authentication strategy attached to a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthConfig {
    None,
    Basic {
        username: String,
        password: String,
    },
    Token {
        token: String,
    },
    Header {
        name: String,
        value: String,
    },
    BrowserLogin(BrowserLoginConfig),
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig::None
    }
}

impl AuthConfig {
    pub fn requires_browser_login(&self) -> bool {
        matches!(self, AuthConfig::BrowserLogin(_))
    }

    /// Validates that only fields legal for the active tag are populated.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            AuthConfig::None => Ok(()),
            AuthConfig::Basic { username, .. } => {
                if username.trim().is_empty() {
                    return Err("basic auth requires a username".into());
                }
                Ok(())
            }
            AuthConfig::Token { token } => {
                if token.trim().is_empty() {
                    return Err("token auth requires a non-empty token".into());
                }
                Ok(())
            }
            AuthConfig::Header { name, .. } => {
                if name.trim().is_empty() {
                    return Err("header auth requires a header name".into());
                }
                Ok(())
            }
            AuthConfig::BrowserLogin(cfg) => {
                if cfg.login_url.trim().is_empty() {
                    return Err("browser login requires a login URL".into());
                }
                if cfg.username.trim().is_empty() {
                    return Err("browser login requires a username".into());
                }
                match cfg.login_type {
                    LoginType::Modal if cfg.modal_trigger_selector.is_none() => {
                        Err("MODAL login requires a modal trigger selector".into())
                    }
                    LoginType::Page if cfg.modal_trigger_selector.is_some() => {
                        Err("modal trigger selector is only valid for MODAL login".into())
                    }
                    _ => Ok(()),
                }
            }
        }
    }

    /// Applies a partial update on top of a stored config.
    ///
    /// Blank secrets in the incoming config never overwrite stored ones: a
    /// caller editing a target's name sends the config back without the
    /// password, and the stored secret survives. A change of variant replaces
    /// the config wholesale.
    pub fn merged_with(&self, incoming: AuthConfig) -> AuthConfig {
        match (self, incoming) {
            (
                AuthConfig::Basic { password: old, .. },
                AuthConfig::Basic { username, password },
            ) => AuthConfig::Basic {
                username,
                password: if password.is_empty() {
                    old.clone()
                } else {
                    password
                },
            },
            (AuthConfig::Token { token: old }, AuthConfig::Token { token }) => AuthConfig::Token {
                token: if token.is_empty() { old.clone() } else { token },
            },
            (AuthConfig::BrowserLogin(old), AuthConfig::BrowserLogin(mut new)) => {
                if new.password.is_empty() {
                    new.password = old.password.clone();
                }
                AuthConfig::BrowserLogin(new)
            }
            (_, incoming) => incoming,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn login_config() -> BrowserLoginConfig {
        BrowserLoginConfig {
            login_url: "https://example.com/login".into(),
            login_type: LoginType::Page,
            modal_trigger_selector: None,
            username_selector: Some("#user".into()),
            password_selector: Some("#pass".into()),
            submit_selector: Some("#submit".into()),
            success_selector: Some(".dashboard".into()),
            username: "admin".into(),
            password: "hunter2".into(),
        }
    }

    #[test]
    fn modal_login_requires_trigger_selector() {
        let mut cfg = login_config();
        cfg.login_type = LoginType::Modal;
        assert!(AuthConfig::BrowserLogin(cfg.clone()).validate().is_err());

        cfg.modal_trigger_selector = Some(".open-login".into());
        assert!(AuthConfig::BrowserLogin(cfg).validate().is_ok());
    }

    #[test]
    fn page_login_rejects_modal_trigger() {
        let mut cfg = login_config();
        cfg.modal_trigger_selector = Some(".open-login".into());
        assert!(AuthConfig::BrowserLogin(cfg).validate().is_err());
    }

    #[test]
    fn blank_token_is_rejected() {
        assert!(AuthConfig::Token { token: "  ".into() }.validate().is_err());
    }

    #[test]
    fn blank_password_update_preserves_stored_secret() {
        let stored = AuthConfig::Basic {
            username: "admin".into(),
            password: "hunter2".into(),
        };
        let merged = stored.merged_with(AuthConfig::Basic {
            username: "admin2".into(),
            password: String::new(),
        });
        assert_eq!(
            merged,
            AuthConfig::Basic {
                username: "admin2".into(),
                password: "hunter2".into(),
            }
        );
    }

    #[test]
    fn browser_login_update_without_password_keeps_secret() {
        let stored = AuthConfig::BrowserLogin(login_config());
        let mut patch = login_config();
        patch.password = String::new();
        patch.success_selector = Some("#home".into());
        let merged = stored.merged_with(AuthConfig::BrowserLogin(patch));
        match merged {
            AuthConfig::BrowserLogin(cfg) => {
                assert_eq!(cfg.password, "hunter2");
                assert_eq!(cfg.success_selector.as_deref(), Some("#home"));
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn variant_change_replaces_config() {
        let stored = AuthConfig::Basic {
            username: "admin".into(),
            password: "hunter2".into(),
        };
        let merged = stored.merged_with(AuthConfig::Token {
            token: "abc".into(),
        });
        assert_eq!(merged, AuthConfig::Token { token: "abc".into() });
    }

    #[test]
    fn tagged_serialization_round_trips() {
        let cfg = AuthConfig::BrowserLogin(login_config());
        let json = serde_json::to_value(&cfg).unwrap();
        assert_eq!(json.get("type").unwrap(), "BROWSER_LOGIN");
        let back: AuthConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, cfg);
    }
}
