//! Integration tests for the prompt store against a real database:
//! encryption at rest, version lifecycle, and access telemetry.

use std::sync::Arc;

use chrono::{Duration, Utc};
use sqlx::PgPool;

use arcana_core::crypto::CipherEngine;
use arcana_db::repositories::{AccessLogRepo, SecurityAlertRepo};
use arcana_monitor::SecurityMonitor;
use arcana_prompts::{Actor, PromptStore, StoreError, TestRun};

const MASTER_SECRET: &str = "an-adequately-long-master-secret-for-tests";

fn store_with(pool: PgPool, secret: &str) -> (PromptStore, Arc<SecurityMonitor>) {
    let monitor = SecurityMonitor::start(pool.clone());
    let cipher = Arc::new(CipherEngine::new(secret).unwrap());
    (
        PromptStore::new(pool, cipher, Arc::clone(&monitor)),
        monitor,
    )
}

// ---------------------------------------------------------------------------
// Test: round trip through encrypted storage
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn create_and_read_round_trips_plaintext(pool: PgPool) {
    let (store, monitor) = store_with(pool.clone(), MASTER_SECRET);
    let actor = Actor::user("user-1");

    store
        .create_prompt(
            "questionFilter",
            "You judge whether a question suits a tarot reading.",
            Some("validation prompt"),
            &actor,
        )
        .await
        .unwrap();

    let plaintext = store.get_active_prompt("questionFilter", &actor).await.unwrap();
    assert_eq!(
        plaintext,
        "You judge whether a question suits a tarot reading."
    );

    // Nothing readable at rest: the stored column is opaque base64, not the
    // plaintext.
    let row: (String,) =
        sqlx::query_as("SELECT encrypted_content FROM prompt_templates WHERE name = $1")
            .bind("questionFilter")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_ne!(row.0, plaintext);
    assert!(!row.0.contains("tarot"));

    monitor.close().await;

    // Both operations left an access trail.
    let since = Utc::now() - Duration::minutes(5);
    let stats = AccessLogRepo::window_stats(&pool, since).await.unwrap();
    assert_eq!(stats.total_accesses, 2);
    assert_eq!(stats.failed_accesses, 0);
}

// ---------------------------------------------------------------------------
// Test: updates allocate versions; old versions stay readable
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn update_allocates_versions_and_keeps_history(pool: PgPool) {
    let (store, monitor) = store_with(pool.clone(), MASTER_SECRET);
    let actor = Actor::default();

    store
        .create_prompt("readingAgent", "first draft", None, &actor)
        .await
        .unwrap();
    let v2 = store
        .update_prompt("readingAgent", "second draft", Some("tone pass"), &actor)
        .await
        .unwrap();
    assert_eq!(v2, 2);

    // The active prompt now serves the latest content.
    let active = store.get_active_prompt("readingAgent", &actor).await.unwrap();
    assert_eq!(active, "second draft");

    // The first version is still retrievable verbatim.
    let v1 = store.get_version("readingAgent", 1, &actor).await.unwrap();
    assert_eq!(v1, "first draft");

    monitor.close().await;
}

// ---------------------------------------------------------------------------
// Test: activating a historical version rolls the content back
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn activating_old_version_rolls_back_content(pool: PgPool) {
    let (store, monitor) = store_with(pool.clone(), MASTER_SECRET);
    let actor = Actor::default();

    store
        .create_prompt("questionAnalysis", "first draft", None, &actor)
        .await
        .unwrap();
    store
        .update_prompt("questionAnalysis", "regressed draft", None, &actor)
        .await
        .unwrap();

    store
        .activate_version("questionAnalysis", 1, &actor)
        .await
        .unwrap();

    let active = store
        .get_active_prompt("questionAnalysis", &actor)
        .await
        .unwrap();
    assert_eq!(active, "first draft");

    // A missing version is a typed error, not a silent no-op.
    let err = store
        .activate_version("questionAnalysis", 42, &actor)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::VersionNotFound { version: 42, .. }));

    monitor.close().await;
}

// ---------------------------------------------------------------------------
// Test: missing prompts fail loudly and are logged as failures
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn missing_prompt_is_not_found_and_logged(pool: PgPool) {
    let (store, monitor) = store_with(pool.clone(), MASTER_SECRET);
    let actor = Actor::user("user-1");

    let err = store.get_active_prompt("noSuchPrompt", &actor).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));

    monitor.close().await;

    let since = Utc::now() - Duration::minutes(5);
    let stats = AccessLogRepo::window_stats(&pool, since).await.unwrap();
    assert_eq!(stats.failed_accesses, 1);
}

// ---------------------------------------------------------------------------
// Test: a wrong master secret surfaces as a crypto error plus an alert
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn wrong_master_secret_raises_encryption_failure(pool: PgPool) {
    let (store, monitor) = store_with(pool.clone(), MASTER_SECRET);
    let actor = Actor::default();
    store
        .create_prompt("questionFilter", "sealed under the right key", None, &actor)
        .await
        .unwrap();
    monitor.close().await;

    // Same rows, different key: decrypt must fail hard, never fall back.
    let (wrong_store, wrong_monitor) = store_with(
        pool.clone(),
        "a-different-but-equally-long-master-secret",
    );
    let err = wrong_store
        .get_active_prompt("questionFilter", &actor)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Crypto(_)));

    wrong_monitor.close().await;

    let since = Utc::now() - Duration::minutes(5);
    let alerts = SecurityAlertRepo::count_by_type(&pool, "ENCRYPTION_FAILURE", since)
        .await
        .unwrap();
    assert_eq!(alerts, 1);
}

// ---------------------------------------------------------------------------
// Test: deactivation retires a prompt without destroying history
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn deactivated_prompt_disappears_from_active_reads(pool: PgPool) {
    let (store, monitor) = store_with(pool.clone(), MASTER_SECRET);
    let actor = Actor::default();

    store
        .create_prompt("questionFilter", "retire me", None, &actor)
        .await
        .unwrap();
    store.deactivate_prompt("questionFilter", &actor).await.unwrap();

    let err = store
        .get_active_prompt("questionFilter", &actor)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));

    // History survives retirement: the version is still readable directly.
    let v1 = store.get_version("questionFilter", 1, &actor).await.unwrap();
    assert_eq!(v1, "retire me");

    let listed = store.list_prompts(true).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(!listed[0].is_active);

    monitor.close().await;
}

// ---------------------------------------------------------------------------
// Test: test results feed the performance analytics
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn test_results_drive_performance_analytics(pool: PgPool) {
    let (store, monitor) = store_with(pool.clone(), MASTER_SECRET);
    let actor = Actor::default();

    store
        .create_prompt("readingAgent", "draft", None, &actor)
        .await
        .unwrap();
    store
        .update_prompt("readingAgent", "better draft", None, &actor)
        .await
        .unwrap();

    for (version, success, elapsed) in [(1, true, 900), (1, false, 1200), (2, true, 700)] {
        store
            .record_test_result(
                "readingAgent",
                TestRun {
                    version,
                    test_question: "What does my week hold?".into(),
                    result_data: None,
                    execution_time_ms: elapsed,
                    token_usage: Some(250),
                    ai_provider: Some("openai".into()),
                    success,
                },
            )
            .await
            .unwrap();
    }

    let report = store.performance_analytics("readingAgent", 30).await.unwrap();
    assert_eq!(report.versions.len(), 2);

    let v1 = report.versions.iter().find(|v| v.version == 1).unwrap();
    assert_eq!(v1.total_tests, 2);
    assert!((v1.success_rate - 0.5).abs() < 1e-9);

    // Version 2 wins on success rate.
    assert_eq!(report.best_version, Some(2));

    monitor.close().await;
}
