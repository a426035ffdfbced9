//! Security alert models.
//!
//! Alerts are derived records produced by the monitor's threat heuristics,
//! never by direct user action.

use arcana_core::error::CoreError;
use arcana_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// Alert type
// ---------------------------------------------------------------------------

/// Category of a detected security anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    UnauthorizedAccess,
    MultipleFailedAttempts,
    SuspiciousPattern,
    EncryptionFailure,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnauthorizedAccess => "UNAUTHORIZED_ACCESS",
            Self::MultipleFailedAttempts => "MULTIPLE_FAILED_ATTEMPTS",
            Self::SuspiciousPattern => "SUSPICIOUS_PATTERN",
            Self::EncryptionFailure => "ENCRYPTION_FAILURE",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "UNAUTHORIZED_ACCESS" => Ok(Self::UnauthorizedAccess),
            "MULTIPLE_FAILED_ATTEMPTS" => Ok(Self::MultipleFailedAttempts),
            "SUSPICIOUS_PATTERN" => Ok(Self::SuspiciousPattern),
            "ENCRYPTION_FAILURE" => Ok(Self::EncryptionFailure),
            other => Err(CoreError::Validation(format!(
                "Unknown alert type: '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// Alert severity ladder. CRITICAL alerts bypass buffering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            "CRITICAL" => Ok(Self::Critical),
            other => Err(CoreError::Validation(format!(
                "Unknown alert severity: '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Entity + create DTO
// ---------------------------------------------------------------------------

/// A security alert row from `security_alerts`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SecurityAlert {
    pub id: DbId,
    pub alert_type: String,
    pub severity: String,
    pub description: String,
    pub user_id: Option<String>,
    pub ip_address: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Timestamp,
}

/// DTO for raising a new alert. Timestamped at creation because alerts may
/// sit in the monitor's buffer before flushing.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSecurityAlert {
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub description: String,
    pub user_id: Option<String>,
    pub ip_address: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Timestamp,
}

impl CreateSecurityAlert {
    pub fn new(
        alert_type: AlertType,
        severity: AlertSeverity,
        description: impl Into<String>,
    ) -> Self {
        Self {
            alert_type,
            severity,
            description: description.into(),
            user_id: None,
            ip_address: None,
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

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering_matches_the_ladder() {
        assert!(AlertSeverity::Low < AlertSeverity::Medium);
        assert!(AlertSeverity::Medium < AlertSeverity::High);
        assert!(AlertSeverity::High < AlertSeverity::Critical);
    }

    #[test]
    fn alert_type_round_trips_through_strings() {
        for t in [
            AlertType::UnauthorizedAccess,
            AlertType::MultipleFailedAttempts,
            AlertType::SuspiciousPattern,
            AlertType::EncryptionFailure,
        ] {
            assert_eq!(AlertType::parse(t.as_str()).unwrap(), t);
        }
    }
}
