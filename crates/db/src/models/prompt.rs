//! Prompt template, version and test-result models.
//!
//! Templates own their versions exclusively. Content columns always hold the
//! cipher engine's opaque base64 format, never plaintext; this layer moves
//! ciphertext around without looking inside it.

use arcana_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// Template entity
// ---------------------------------------------------------------------------

/// A prompt template row from `prompt_templates`.
///
/// `encrypted_content` and `version` always mirror the currently activated
/// version's payload. Templates are never hard-deleted; retiring one flips
/// `is_active` off.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PromptTemplate {
    pub id: DbId,
    pub name: String,
    pub encrypted_content: String,
    pub version: i32,
    pub is_active: bool,
    pub description: Option<String>,
    pub performance_notes: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Version entity
// ---------------------------------------------------------------------------

/// A prompt version row from `prompt_versions`.
///
/// Version numbers are allocated by the store (never client-supplied) and
/// unique per template, enforced by a database constraint. Rows are
/// append-only; only `is_active` ever changes after insert.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PromptVersion {
    pub id: DbId,
    pub template_id: DbId,
    pub version: i32,
    pub encrypted_content: String,
    pub is_active: bool,
    pub description: Option<String>,
    pub performance_metrics: Option<serde_json::Value>,
    pub created_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Test result entity + DTO
// ---------------------------------------------------------------------------

/// An ad-hoc evaluation run against a template version. Read-only after
/// creation; used for performance aggregates only.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PromptTestResult {
    pub id: DbId,
    pub template_id: DbId,
    pub version: i32,
    pub test_question: String,
    pub result_data: Option<serde_json::Value>,
    pub execution_time_ms: i32,
    pub token_usage: Option<i32>,
    pub ai_provider: Option<String>,
    pub success: bool,
    pub created_at: Timestamp,
}

/// Input for recording a test result.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePromptTestResult {
    pub template_id: DbId,
    pub version: i32,
    pub test_question: String,
    pub result_data: Option<serde_json::Value>,
    pub execution_time_ms: i32,
    pub token_usage: Option<i32>,
    pub ai_provider: Option<String>,
    pub success: bool,
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

/// Per-version aggregate computed from `prompt_test_results`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PromptVersionStats {
    pub version: i32,
    pub total_tests: i64,
    pub avg_execution_time_ms: Option<f64>,
    pub avg_token_usage: Option<f64>,
    /// Fraction of successful tests in [0, 1].
    pub success_rate: Option<f64>,
}
