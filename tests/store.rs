//! Store behavior against an in-memory SQLite database: registry CRUD,
//! atomic result persistence, cascade delete, and the latency window.

use chrono::{Duration as ChronoDuration, Utc};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter};

use sitewatch::browser::{CheckErrorKind, IframeProbe, RawCheck, RawError, VideoProbe};
use sitewatch::db::entities::prelude::*;
use sitewatch::db::enums::{AuthConfig, BrowserLoginConfig, LoginType};
use sitewatch::db::services::{self, LATENCY_WINDOW, NewTarget, StoreError, UpdateTarget};
use sitewatch::db;
use sitewatch::status::Status;

async fn test_db() -> DatabaseConnection {
    let conn = db::connect("sqlite::memory:").await.unwrap();
    db::ensure_schema(&conn).await.unwrap();
    conn
}

fn new_target(url: &str) -> NewTarget {
    NewTarget {
        url: url.to_string(),
        name: "test target".to_string(),
        description: None,
        interval_seconds: None,
        is_enabled: None,
        auth: AuthConfig::None,
    }
}

fn clean_raw(latency_ms: u64) -> RawCheck {
    RawCheck {
        http_status: Some(200),
        response_time_ms: latency_ms,
        content_length: Some(1024),
        checked_at: Utc::now(),
        errors: Vec::new(),
        iframes: Vec::new(),
        videos: Vec::new(),
        screenshot: None,
    }
}

#[tokio::test]
async fn duplicate_url_is_rejected_and_leaves_one_record() {
    let conn = test_db().await;

    services::create_target(&conn, new_target("https://example.com"))
        .await
        .unwrap();
    let err = services::create_target(&conn, new_target("https://example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));

    let count = Target::find().count(&conn).await.unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn defaults_apply_on_registration() {
    let conn = test_db().await;
    let target = services::create_target(&conn, new_target("https://example.com"))
        .await
        .unwrap();
    assert_eq!(target.interval_seconds, 300);
    assert!(target.is_enabled);
}

#[tokio::test]
async fn record_and_latest_round_trip() {
    let conn = test_db().await;
    let target = services::create_target(&conn, new_target("https://example.com"))
        .await
        .unwrap();

    let mut raw = clean_raw(120);
    raw.errors.push(RawError::new(
        CheckErrorKind::Console,
        "Uncaught TypeError: x is undefined",
    ));
    raw.iframes.push(IframeProbe {
        src: "https://example.com/embed".to_string(),
        loaded: true,
        error: None,
    });
    raw.videos.push(VideoProbe {
        src: "https://example.com/clip.mp4".to_string(),
        ready_state: 4,
        network_state: 1,
        playable: true,
        error: None,
    });

    let saved = services::record_check(&conn, target.id, Status::Warning, &raw)
        .await
        .unwrap();

    let latest = services::latest_result(&conn, target.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.id, saved.id);
    assert_eq!(latest.status, Status::Warning);
    assert_eq!(latest.http_status, Some(200));
    assert_eq!(latest.response_time_ms, 120);

    let errors = CheckError::find()
        .filter(CheckErrorColumn::CheckResultId.eq(saved.id))
        .all(&conn)
        .await
        .unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, CheckErrorKind::Console);

    assert_eq!(
        IframeCheck::find().count(&conn).await.unwrap(),
        1,
        "iframe sub-check row persisted"
    );
    assert_eq!(VideoCheck::find().count(&conn).await.unwrap(), 1);

    assert_eq!(
        services::previous_status(&conn, target.id).await.unwrap(),
        Some(Status::Warning)
    );
}

#[tokio::test]
async fn previous_status_is_none_for_fresh_target() {
    let conn = test_db().await;
    let target = services::create_target(&conn, new_target("https://example.com"))
        .await
        .unwrap();
    assert_eq!(
        services::previous_status(&conn, target.id).await.unwrap(),
        None
    );
}

#[tokio::test]
async fn latency_window_is_capped_and_evicts_oldest() {
    let conn = test_db().await;
    let target = services::create_target(&conn, new_target("https://example.com"))
        .await
        .unwrap();

    let base = Utc::now() - ChronoDuration::minutes(60);
    for i in 0..(LATENCY_WINDOW as i64 + 5) {
        let mut raw = clean_raw(100 + i as u64);
        raw.checked_at = base + ChronoDuration::minutes(i);
        services::record_check(&conn, target.id, Status::Stable, &raw)
            .await
            .unwrap();
    }

    let history = services::latency_history(&conn, target.id).await.unwrap();
    assert_eq!(history.len(), LATENCY_WINDOW);
    // Oldest five samples (100..=104) were evicted; order is oldest first.
    assert_eq!(history.first(), Some(&105));
    assert_eq!(history.last(), Some(&124));
}

#[tokio::test]
async fn latency_samples_are_isolated_per_target() {
    let conn = test_db().await;
    let a = services::create_target(&conn, new_target("https://a.example.com"))
        .await
        .unwrap();
    let b = services::create_target(&conn, new_target("https://b.example.com"))
        .await
        .unwrap();

    services::record_check(&conn, a.id, Status::Fresh, &clean_raw(50))
        .await
        .unwrap();
    services::record_check(&conn, b.id, Status::Fresh, &clean_raw(900))
        .await
        .unwrap();

    assert_eq!(
        services::latency_history(&conn, a.id).await.unwrap(),
        vec![50]
    );
    assert_eq!(
        services::latency_history(&conn, b.id).await.unwrap(),
        vec![900]
    );
}

#[tokio::test]
async fn delete_cascades_to_all_derived_records() {
    let conn = test_db().await;
    let target = services::create_target(&conn, new_target("https://example.com"))
        .await
        .unwrap();
    let survivor = services::create_target(&conn, new_target("https://other.example.com"))
        .await
        .unwrap();

    let mut raw = clean_raw(80);
    raw.errors.push(RawError::new(CheckErrorKind::Network, "503 from asset"));
    raw.iframes.push(IframeProbe {
        src: "https://example.com/frame".to_string(),
        loaded: false,
        error: Some("timeout".to_string()),
    });
    raw.videos.push(VideoProbe {
        src: "https://example.com/v.mp4".to_string(),
        ready_state: 0,
        network_state: 3,
        playable: false,
        error: Some("NETWORK_NO_SOURCE".to_string()),
    });
    services::record_check(&conn, target.id, Status::Warning, &raw)
        .await
        .unwrap();
    services::record_check(&conn, survivor.id, Status::Fresh, &clean_raw(30))
        .await
        .unwrap();

    services::delete_target(&conn, target.id).await.unwrap();

    assert!(matches!(
        services::get_target(&conn, target.id).await.unwrap_err(),
        StoreError::NotFound(_)
    ));
    assert_eq!(
        CheckResult::find()
            .filter(CheckResultColumn::TargetId.eq(target.id))
            .count(&conn)
            .await
            .unwrap(),
        0
    );
    assert_eq!(CheckError::find().count(&conn).await.unwrap(), 0);
    assert_eq!(IframeCheck::find().count(&conn).await.unwrap(), 0);
    assert_eq!(VideoCheck::find().count(&conn).await.unwrap(), 0);
    assert_eq!(
        services::latency_history(&conn, target.id).await.unwrap(),
        Vec::<i64>::new()
    );

    // Unrelated target's records are untouched.
    assert!(services::get_target(&conn, survivor.id).await.is_ok());
    assert_eq!(
        services::latency_history(&conn, survivor.id).await.unwrap(),
        vec![30]
    );
}

#[tokio::test]
async fn deleting_missing_target_reports_not_found() {
    let conn = test_db().await;
    assert!(matches!(
        services::delete_target(&conn, 404).await.unwrap_err(),
        StoreError::NotFound(404)
    ));
}

#[tokio::test]
async fn update_preserves_stored_secrets_when_blank() {
    let conn = test_db().await;
    let target = services::create_target(
        &conn,
        NewTarget {
            auth: AuthConfig::BrowserLogin(BrowserLoginConfig {
                login_url: "https://example.com/login".to_string(),
                login_type: LoginType::Page,
                modal_trigger_selector: None,
                username_selector: None,
                password_selector: None,
                submit_selector: None,
                success_selector: None,
                username: "ops".to_string(),
                password: "s3cret".to_string(),
            }),
            ..new_target("https://example.com")
        },
    )
    .await
    .unwrap();

    // Rename the login user but leave the password blank.
    let updated = services::update_target(
        &conn,
        target.id,
        UpdateTarget {
            auth: Some(AuthConfig::BrowserLogin(BrowserLoginConfig {
                login_url: "https://example.com/login".to_string(),
                login_type: LoginType::Page,
                modal_trigger_selector: None,
                username_selector: None,
                password_selector: None,
                submit_selector: None,
                success_selector: None,
                username: "ops2".to_string(),
                password: String::new(),
            })),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    match services::auth_config_of(&updated).unwrap() {
        AuthConfig::BrowserLogin(login) => {
            assert_eq!(login.username, "ops2");
            assert_eq!(login.password, "s3cret", "blank password must not erase stored secret");
        }
        other => panic!("unexpected auth config: {other:?}"),
    }
}

#[tokio::test]
async fn switching_auth_variant_replaces_wholesale() {
    let conn = test_db().await;
    let target = services::create_target(
        &conn,
        NewTarget {
            auth: AuthConfig::Basic {
                username: "ops".to_string(),
                password: "s3cret".to_string(),
            },
            ..new_target("https://example.com")
        },
    )
    .await
    .unwrap();

    let updated = services::update_target(
        &conn,
        target.id,
        UpdateTarget {
            auth: Some(AuthConfig::Token {
                token: "abc123".to_string(),
            }),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(
        services::auth_config_of(&updated).unwrap(),
        AuthConfig::Token {
            token: "abc123".to_string()
        }
    );
}

#[tokio::test]
async fn disabled_targets_are_excluded_from_listing() {
    let conn = test_db().await;
    let a = services::create_target(&conn, new_target("https://a.example.com"))
        .await
        .unwrap();
    let b = services::create_target(&conn, new_target("https://b.example.com"))
        .await
        .unwrap();

    services::set_enabled(&conn, a.id, false).await.unwrap();

    let enabled = services::list_enabled_targets(&conn).await.unwrap();
    assert_eq!(enabled.len(), 1);
    assert_eq!(enabled[0].id, b.id);
}
