//! Repository for the `prompt_test_results` table.

use sqlx::PgPool;
use arcana_core::types::{DbId, Timestamp};

use crate::models::prompt::{CreatePromptTestResult, PromptTestResult, PromptVersionStats};

/// Column list for prompt_test_results queries.
const COLUMNS: &str = "id, template_id, version, test_question, result_data, \
    execution_time_ms, token_usage, ai_provider, success, created_at";

/// Provides insert and aggregate queries for prompt test results.
pub struct PromptTestResultRepo;

impl PromptTestResultRepo {
    /// Record one evaluation run. Rows are read-only after creation.
    pub async fn create(
        pool: &PgPool,
        input: &CreatePromptTestResult,
    ) -> Result<PromptTestResult, sqlx::Error> {
        let query = format!(
            "INSERT INTO prompt_test_results
                (template_id, version, test_question, result_data,
                 execution_time_ms, token_usage, ai_provider, success)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PromptTestResult>(&query)
            .bind(input.template_id)
            .bind(input.version)
            .bind(&input.test_question)
            .bind(&input.result_data)
            .bind(input.execution_time_ms)
            .bind(input.token_usage)
            .bind(&input.ai_provider)
            .bind(input.success)
            .fetch_one(pool)
            .await
    }

    /// Per-version aggregates for a template since a cutoff, version ascending.
    pub async fn stats_for_template(
        pool: &PgPool,
        template_id: DbId,
        since: Timestamp,
    ) -> Result<Vec<PromptVersionStats>, sqlx::Error> {
        sqlx::query_as::<_, PromptVersionStats>(
            "SELECT version,
                    COUNT(*) AS total_tests,
                    AVG(execution_time_ms)::float8 AS avg_execution_time_ms,
                    AVG(token_usage)::float8 AS avg_token_usage,
                    AVG(CASE WHEN success THEN 1.0 ELSE 0.0 END)::float8 AS success_rate
             FROM prompt_test_results
             WHERE template_id = $1 AND created_at >= $2
             GROUP BY version
             ORDER BY version ASC",
        )
        .bind(template_id)
        .bind(since)
        .fetch_all(pool)
        .await
    }
}
