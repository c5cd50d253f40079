//! Stability status derivation.
//!
//! `derive` is a pure function over the previous status and one raw check
//! outcome, so the transition rules are unit-testable without a browser or a
//! database. The four-valued model carries a one-check memory: a target coming
//! back from an outage is `Fresh` (probationary) and only promotes to `Stable`
//! on the following clean check, which keeps a single lucky check from
//! flipping a flapping target straight back to healthy.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::browser::{CheckErrorKind, RawCheck};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text", enum_name = "check_status_enum")]
pub enum Status {
    /// Healthy, steady-state.
    #[sea_orm(string_value = "STABLE")]
    Stable,
    /// Just recovered; healthy but probationary.
    #[sea_orm(string_value = "FRESH")]
    Fresh,
    /// Reachable but degraded (slow content, partial failures).
    #[sea_orm(string_value = "WARNING")]
    Warning,
    /// Unreachable, or auth/content hard failure.
    #[sea_orm(string_value = "DOWN")]
    Down,
}

impl Status {
    /// Binary projection used by report summaries: everything short of `Down`
    /// counts as up.
    pub fn is_up(self) -> bool {
        self != Status::Down
    }

    pub fn is_healthy(self) -> bool {
        matches!(self, Status::Stable | Status::Fresh)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Stable => "STABLE",
            Status::Fresh => "FRESH",
            Status::Warning => "WARNING",
            Status::Down => "DOWN",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STABLE" => Ok(Status::Stable),
            "FRESH" => Ok(Status::Fresh),
            "WARNING" => Ok(Status::Warning),
            "DOWN" => Ok(Status::Down),
            other => Err(format!("unknown status '{other}'")),
        }
    }
}

/// Outcome of one derivation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Derivation {
    pub status: Status,
    /// True exactly when the transition is operationally meaningful: entering
    /// `Down` from any non-`Down` state, or leaving `Down`/`Warning` for a
    /// healthy state. `Fresh` -> `Stable` stays silent.
    pub alert: bool,
}

/// Maps a raw check plus the previous status to the new status and whether an
/// alert fires.
pub fn derive(previous: Option<Status>, raw: &RawCheck) -> Derivation {
    let fatal = raw
        .errors
        .iter()
        .any(|e| matches!(e.kind, CheckErrorKind::Navigation | CheckErrorKind::Auth))
        || raw.http_status.is_some_and(|code| !(200..400).contains(&code));

    let content_errors = raw.errors.iter().any(|e| {
        matches!(
            e.kind,
            CheckErrorKind::Console | CheckErrorKind::Network | CheckErrorKind::Content
        )
    });

    let status = if fatal {
        Status::Down
    } else if content_errors {
        Status::Warning
    } else {
        match previous {
            Some(Status::Stable) => Status::Stable,
            Some(Status::Fresh) => Status::Stable,
            // Recovery from an outage or degradation is probationary, and so
            // is the very first check of a target's life.
            Some(Status::Down) | Some(Status::Warning) | None => Status::Fresh,
        }
    };

    let alert = match (previous, status) {
        (Some(Status::Down), Status::Down) => false,
        (_, Status::Down) => true,
        (Some(Status::Down) | Some(Status::Warning), s) if s.is_healthy() => true,
        _ => false,
    };

    Derivation { status, alert }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{RawCheck, RawError};
    use chrono::Utc;

    fn clean_check() -> RawCheck {
        RawCheck {
            http_status: Some(200),
            response_time_ms: 120,
            content_length: Some(5_000),
            checked_at: Utc::now(),
            errors: Vec::new(),
            iframes: Vec::new(),
            videos: Vec::new(),
            screenshot: None,
        }
    }

    fn check_with(kind: CheckErrorKind) -> RawCheck {
        let mut raw = clean_check();
        raw.errors.push(RawError {
            kind,
            message: "boom".into(),
            details: None,
        });
        raw
    }

    #[test]
    fn clean_check_after_down_is_fresh_never_stable() {
        let d = derive(Some(Status::Down), &clean_check());
        assert_eq!(d.status, Status::Fresh);
        assert!(d.alert, "recovery out of DOWN must alert");
    }

    #[test]
    fn two_clean_checks_promote_down_to_fresh_to_stable() {
        let first = derive(Some(Status::Down), &clean_check());
        assert_eq!(first.status, Status::Fresh);
        let second = derive(Some(first.status), &clean_check());
        assert_eq!(second.status, Status::Stable);
        assert!(!second.alert, "FRESH -> STABLE is a lateral healthy move");
    }

    #[test]
    fn repeated_clean_checks_while_stable_never_realert() {
        let mut previous = Status::Stable;
        for _ in 0..5 {
            let d = derive(Some(previous), &clean_check());
            assert_eq!(d.status, Status::Stable);
            assert!(!d.alert);
            previous = d.status;
        }
    }

    #[test]
    fn navigation_error_is_down_and_alerts_once() {
        let raw = check_with(CheckErrorKind::Navigation);
        let d = derive(Some(Status::Stable), &raw);
        assert_eq!(d.status, Status::Down);
        assert!(d.alert);

        let repeat = derive(Some(Status::Down), &raw);
        assert_eq!(repeat.status, Status::Down);
        assert!(!repeat.alert, "staying DOWN must not re-alert");
    }

    #[test]
    fn auth_error_is_fatal() {
        let d = derive(Some(Status::Fresh), &check_with(CheckErrorKind::Auth));
        assert_eq!(d.status, Status::Down);
        assert!(d.alert);
    }

    #[test]
    fn non_success_http_status_is_down_even_without_errors() {
        let mut raw = clean_check();
        raw.http_status = Some(503);
        let d = derive(Some(Status::Stable), &raw);
        assert_eq!(d.status, Status::Down);
        assert!(d.alert);
    }

    #[test]
    fn content_errors_on_a_loaded_page_are_warning() {
        for kind in [
            CheckErrorKind::Console,
            CheckErrorKind::Network,
            CheckErrorKind::Content,
        ] {
            let d = derive(Some(Status::Stable), &check_with(kind));
            assert_eq!(d.status, Status::Warning);
            assert!(!d.alert, "degrading into WARNING does not alert");
        }
    }

    #[test]
    fn recovery_out_of_warning_alerts() {
        let d = derive(Some(Status::Warning), &clean_check());
        assert_eq!(d.status, Status::Fresh);
        assert!(d.alert);
    }

    #[test]
    fn first_check_ever_is_probationary() {
        let d = derive(None, &clean_check());
        assert_eq!(d.status, Status::Fresh);
        assert!(!d.alert, "no prior outage, nothing to announce");
    }

    #[test]
    fn first_check_ever_down_alerts() {
        let d = derive(None, &check_with(CheckErrorKind::Navigation));
        assert_eq!(d.status, Status::Down);
        assert!(d.alert);
    }

    #[test]
    fn status_round_trips_through_strings() {
        for s in [Status::Stable, Status::Fresh, Status::Warning, Status::Down] {
            assert_eq!(s.to_string().parse::<Status>().unwrap(), s);
        }
    }
}
