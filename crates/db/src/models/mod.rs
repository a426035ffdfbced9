//! Entity models and DTOs, grouped by table family.

pub mod access_log;
pub mod prompt;
pub mod security_alert;

pub use access_log::{
    AccessLogEntry, AccessType, AccessWindowStats, CreateAccessLog, PromptAccessCount,
};
pub use prompt::{
    CreatePromptTestResult, PromptTemplate, PromptTestResult, PromptVersion, PromptVersionStats,
};
pub use security_alert::{AlertSeverity, AlertType, CreateSecurityAlert, SecurityAlert};
