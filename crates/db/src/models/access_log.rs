//! Prompt access log models (append-only audit trail).
//!
//! Access logs have no `updated_at` field (immutable records). Rows are
//! buffered in memory by the security monitor and land here in batches.

use arcana_core::error::CoreError;
use arcana_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// Access type
// ---------------------------------------------------------------------------

/// What kind of prompt operation an access log entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessType {
    Read,
    Decrypt,
    Update,
    Delete,
}

impl AccessType {
    /// Return the database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "READ",
            Self::Decrypt => "DECRYPT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }

    /// Parse from a database string, rejecting unknown values.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "READ" => Ok(Self::Read),
            "DECRYPT" => Ok(Self::Decrypt),
            "UPDATE" => Ok(Self::Update),
            "DELETE" => Ok(Self::Delete),
            other => Err(CoreError::Validation(format!(
                "Unknown access type: '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Entity + create DTO
// ---------------------------------------------------------------------------

/// A single access log row from `prompt_access_logs`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AccessLogEntry {
    pub id: DbId,
    pub prompt_name: String,
    pub access_type: String,
    pub user_id: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub success: bool,
    pub error_message: Option<String>,
    pub execution_time_ms: Option<i32>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Timestamp,
}

/// DTO for inserting a new access log entry.
///
/// Designed for batch inserts; carries its own `created_at` because entries
/// sit in the monitor's buffer before they reach the database.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAccessLog {
    pub prompt_name: String,
    pub access_type: AccessType,
    pub user_id: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub success: bool,
    pub error_message: Option<String>,
    pub execution_time_ms: Option<i32>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Timestamp,
}

impl CreateAccessLog {
    /// Minimal entry for a prompt operation outcome, timestamped now.
    pub fn new(prompt_name: impl Into<String>, access_type: AccessType, success: bool) -> Self {
        Self {
            prompt_name: prompt_name.into(),
            access_type,
            user_id: None,
            ip_address: None,
            user_agent: None,
            success,
            error_message: None,
            execution_time_ms: None,
            metadata: None,
            created_at: chrono::Utc::now(),
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_ip(mut self, ip_address: impl Into<String>) -> Self {
        self.ip_address = Some(ip_address.into());
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn with_elapsed_ms(mut self, elapsed_ms: i32) -> Self {
        self.execution_time_ms = Some(elapsed_ms);
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

/// Window totals for the security dashboard.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AccessWindowStats {
    pub total_accesses: i64,
    pub failed_accesses: i64,
    pub distinct_users: i64,
    pub distinct_ips: i64,
}

/// Access count for one prompt name within a window.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PromptAccessCount {
    pub prompt_name: String,
    pub accesses: i64,
}
