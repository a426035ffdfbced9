//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument. Multi-statement operations
//! own their transaction so callers can wrap them in a retry policy.

pub mod access_log_repo;
pub mod prompt_template_repo;
pub mod prompt_test_result_repo;
pub mod prompt_version_repo;
pub mod security_alert_repo;

pub use access_log_repo::AccessLogRepo;
pub use prompt_template_repo::PromptTemplateRepo;
pub use prompt_test_result_repo::PromptTestResultRepo;
pub use prompt_version_repo::PromptVersionRepo;
pub use security_alert_repo::SecurityAlertRepo;
