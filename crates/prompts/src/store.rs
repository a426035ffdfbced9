//! The prompt store service.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use arcana_core::crypto::{CipherEngine, CryptoError};
use arcana_core::retry::RetryPolicy;
use arcana_core::types::Timestamp;
use arcana_db::models::{AccessType, CreateAccessLog, CreatePromptTestResult, PromptTestResult};
use arcana_db::repositories::{
    PromptTemplateRepo, PromptTestResultRepo, PromptVersionRepo,
};
use arcana_db::DbPool;
use arcana_monitor::SecurityMonitor;

use crate::analytics::{self, PerformanceReport};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No template (or no active template) with this name.
    #[error("Prompt not found: '{0}'")]
    NotFound(String),

    /// The template exists but has no such version.
    #[error("Version {version} of prompt '{name}' not found")]
    VersionNotFound { name: String, version: i32 },

    /// Encrypt/decrypt failure. Never masked by a default prompt.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Database failure (after internal retries, where applicable).
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// True for transient conflicts worth retrying: uniqueness violations,
/// deadlocks, serialization failures and pool timeouts.
fn is_retryable(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => matches!(
            db.code().as_deref(),
            Some("23505") | Some("40001") | Some("40P01")
        ),
        sqlx::Error::PoolTimedOut => true,
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Actor context
// ---------------------------------------------------------------------------

/// Who is touching a prompt, for the access log. All fields optional; the
/// HTTP layer fills in what it knows.
#[derive(Debug, Clone, Default)]
pub struct Actor {
    pub user_id: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl Actor {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    fn stamp(&self, mut entry: CreateAccessLog) -> CreateAccessLog {
        entry.user_id = self.user_id.clone();
        entry.ip_address = self.ip_address.clone();
        entry.user_agent = self.user_agent.clone();
        entry
    }
}

// ---------------------------------------------------------------------------
// Summaries
// ---------------------------------------------------------------------------

/// Template summary for listings. Carries no prompt content, encrypted or
/// otherwise.
#[derive(Debug, Clone, Serialize)]
pub struct PromptTemplateSummary {
    pub name: String,
    pub active_version: i32,
    pub is_active: bool,
    pub description: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub versions: Vec<PromptVersionSummary>,
}

/// One version in a template summary, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct PromptVersionSummary {
    pub version: i32,
    pub is_active: bool,
    pub description: Option<String>,
    pub created_at: Timestamp,
}

/// Input for recording one evaluation run against a prompt version.
#[derive(Debug, Clone)]
pub struct TestRun {
    pub version: i32,
    pub test_question: String,
    pub result_data: Option<serde_json::Value>,
    pub execution_time_ms: i32,
    pub token_usage: Option<i32>,
    pub ai_provider: Option<String>,
    pub success: bool,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Encrypted, versioned prompt storage with telemetry on every access.
pub struct PromptStore {
    pool: DbPool,
    cipher: Arc<CipherEngine>,
    monitor: Arc<SecurityMonitor>,
    retry: RetryPolicy,
}

impl PromptStore {
    pub fn new(pool: DbPool, cipher: Arc<CipherEngine>, monitor: Arc<SecurityMonitor>) -> Self {
        Self {
            pool,
            cipher,
            monitor,
            retry: RetryPolicy::default(),
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Fetch and decrypt the active version of a named prompt.
    ///
    /// Emits exactly one access-log event per call, success or failure, with
    /// elapsed time. Decrypt failures are logged as failed DECRYPT accesses
    /// (which the monitor escalates) and propagate as hard errors.
    pub async fn get_active_prompt(
        &self,
        name: &str,
        actor: &Actor,
    ) -> Result<String, StoreError> {
        let started = Instant::now();
        let result = self.fetch_active_plaintext(name).await;
        self.log_read_outcome(name, actor, started, &result).await;
        result
    }

    /// Fetch and decrypt a specific historical version.
    pub async fn get_version(
        &self,
        name: &str,
        version: i32,
        actor: &Actor,
    ) -> Result<String, StoreError> {
        let started = Instant::now();
        let result = self.fetch_version_plaintext(name, version).await;
        self.log_read_outcome(name, actor, started, &result).await;
        result
    }

    async fn fetch_active_plaintext(&self, name: &str) -> Result<String, StoreError> {
        let template = PromptTemplateRepo::find_active_by_name(&self.pool, name)
            .await?
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        Ok(self.cipher.decrypt(&template.encrypted_content)?)
    }

    async fn fetch_version_plaintext(
        &self,
        name: &str,
        version: i32,
    ) -> Result<String, StoreError> {
        let template = PromptTemplateRepo::find_by_name(&self.pool, name)
            .await?
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        let row = PromptVersionRepo::find_by_template_and_version(&self.pool, template.id, version)
            .await?
            .ok_or_else(|| StoreError::VersionNotFound {
                name: name.to_string(),
                version,
            })?;
        Ok(self.cipher.decrypt(&row.encrypted_content)?)
    }

    /// One access-log event per read, typed DECRYPT when the ciphertext was
    /// reached but could not be opened, READ otherwise.
    async fn log_read_outcome(
        &self,
        name: &str,
        actor: &Actor,
        started: Instant,
        result: &Result<String, StoreError>,
    ) {
        let elapsed_ms = started.elapsed().as_millis() as i32;
        let entry = match result {
            Ok(_) => CreateAccessLog::new(name, AccessType::Read, true),
            Err(StoreError::Crypto(e)) => {
                CreateAccessLog::new(name, AccessType::Decrypt, false).with_error(e.to_string())
            }
            Err(e) => CreateAccessLog::new(name, AccessType::Read, false).with_error(e.to_string()),
        };
        self.monitor
            .log_access(actor.stamp(entry.with_elapsed_ms(elapsed_ms)))
            .await;
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Create a brand-new template whose first version is already active.
    pub async fn create_prompt(
        &self,
        name: &str,
        plaintext: &str,
        description: Option<&str>,
        actor: &Actor,
    ) -> Result<(), StoreError> {
        let started = Instant::now();
        let sealed = self.cipher.encrypt(plaintext)?;
        let result = PromptTemplateRepo::create(&self.pool, name, &sealed, description).await;

        let elapsed_ms = started.elapsed().as_millis() as i32;
        let entry = match &result {
            Ok(_) => CreateAccessLog::new(name, AccessType::Update, true),
            Err(e) => CreateAccessLog::new(name, AccessType::Update, false).with_error(e.to_string()),
        };
        self.monitor
            .log_access(actor.stamp(entry.with_elapsed_ms(elapsed_ms)))
            .await;

        result?;
        tracing::info!(name, "Prompt template created");
        Ok(())
    }

    /// Store new content as the template's next version.
    ///
    /// The new version row is created inactive, but the template's content
    /// and version pointer move to it. Version allocation runs inside one
    /// transaction wrapped in the retry policy (3 attempts, 100/200/400ms)
    /// for transient conflicts; a missing template fails immediately.
    /// Returns the allocated version number.
    pub async fn update_prompt(
        &self,
        name: &str,
        plaintext: &str,
        description: Option<&str>,
        actor: &Actor,
    ) -> Result<i32, StoreError> {
        let started = Instant::now();
        let result = self.update_prompt_inner(name, plaintext, description).await;

        let elapsed_ms = started.elapsed().as_millis() as i32;
        let entry = match &result {
            Ok(version) => CreateAccessLog::new(name, AccessType::Update, true)
                .with_metadata(serde_json::json!({ "new_version": version })),
            Err(e) => CreateAccessLog::new(name, AccessType::Update, false).with_error(e.to_string()),
        };
        self.monitor
            .log_access(actor.stamp(entry.with_elapsed_ms(elapsed_ms)))
            .await;

        result
    }

    async fn update_prompt_inner(
        &self,
        name: &str,
        plaintext: &str,
        description: Option<&str>,
    ) -> Result<i32, StoreError> {
        let template = PromptTemplateRepo::find_by_name(&self.pool, name)
            .await?
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;

        let sealed = self.cipher.encrypt(plaintext)?;

        let version = self
            .retry
            .run(is_retryable, || {
                PromptVersionRepo::create_next(&self.pool, template.id, &sealed, description)
            })
            .await?;

        tracing::info!(name, version = version.version, "Prompt version created");
        Ok(version.version)
    }

    /// Make a historical version the single active one, mirroring its
    /// payload onto the template row.
    pub async fn activate_version(
        &self,
        name: &str,
        version: i32,
        actor: &Actor,
    ) -> Result<(), StoreError> {
        let started = Instant::now();
        let result = self.activate_version_inner(name, version).await;

        let elapsed_ms = started.elapsed().as_millis() as i32;
        let entry = match &result {
            Ok(()) => CreateAccessLog::new(name, AccessType::Update, true)
                .with_metadata(serde_json::json!({ "activated_version": version })),
            Err(e) => CreateAccessLog::new(name, AccessType::Update, false).with_error(e.to_string()),
        };
        self.monitor
            .log_access(actor.stamp(entry.with_elapsed_ms(elapsed_ms)))
            .await;

        result
    }

    async fn activate_version_inner(&self, name: &str, version: i32) -> Result<(), StoreError> {
        let template = PromptTemplateRepo::find_by_name(&self.pool, name)
            .await?
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;

        PromptVersionRepo::activate(&self.pool, template.id, version)
            .await?
            .ok_or_else(|| StoreError::VersionNotFound {
                name: name.to_string(),
                version,
            })?;

        tracing::info!(name, version, "Prompt version activated");
        Ok(())
    }

    /// Retire a template. Version history stays intact for audit/rollback.
    pub async fn deactivate_prompt(&self, name: &str, actor: &Actor) -> Result<(), StoreError> {
        let started = Instant::now();
        let result = match PromptTemplateRepo::set_active(&self.pool, name, false).await {
            Ok(Some(_)) => Ok(()),
            Ok(None) => Err(StoreError::NotFound(name.to_string())),
            Err(e) => Err(StoreError::Database(e)),
        };

        let elapsed_ms = started.elapsed().as_millis() as i32;
        let entry = match &result {
            Ok(()) => CreateAccessLog::new(name, AccessType::Delete, true),
            Err(e) => CreateAccessLog::new(name, AccessType::Delete, false).with_error(e.to_string()),
        };
        self.monitor
            .log_access(actor.stamp(entry.with_elapsed_ms(elapsed_ms)))
            .await;

        result
    }

    // -----------------------------------------------------------------------
    // Listings & analytics
    // -----------------------------------------------------------------------

    /// Template summaries (name ascending) with nested version summaries
    /// (version descending). No content leaves the store here.
    pub async fn list_prompts(
        &self,
        include_inactive: bool,
    ) -> Result<Vec<PromptTemplateSummary>, StoreError> {
        let templates = PromptTemplateRepo::list(&self.pool, include_inactive).await?;

        let mut summaries = Vec::with_capacity(templates.len());
        for template in templates {
            let versions = PromptVersionRepo::list_for_template(&self.pool, template.id)
                .await?
                .into_iter()
                .map(|v| PromptVersionSummary {
                    version: v.version,
                    is_active: v.is_active,
                    description: v.description,
                    created_at: v.created_at,
                })
                .collect();
            summaries.push(PromptTemplateSummary {
                name: template.name,
                active_version: template.version,
                is_active: template.is_active,
                description: template.description,
                created_at: template.created_at,
                updated_at: template.updated_at,
                versions,
            });
        }
        Ok(summaries)
    }

    /// Record one evaluation run against a template version.
    pub async fn record_test_result(
        &self,
        name: &str,
        run: TestRun,
    ) -> Result<PromptTestResult, StoreError> {
        let template = PromptTemplateRepo::find_by_name(&self.pool, name)
            .await?
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;

        let created = PromptTestResultRepo::create(
            &self.pool,
            &CreatePromptTestResult {
                template_id: template.id,
                version: run.version,
                test_question: run.test_question,
                result_data: run.result_data,
                execution_time_ms: run.execution_time_ms,
                token_usage: run.token_usage,
                ai_provider: run.ai_provider,
                success: run.success,
            },
        )
        .await?;
        Ok(created)
    }

    /// Per-version performance aggregates over a trailing window, plus the
    /// best-performing version and rule-based recommendations.
    pub async fn performance_analytics(
        &self,
        name: &str,
        window_days: i64,
    ) -> Result<PerformanceReport, StoreError> {
        let template = PromptTemplateRepo::find_by_name(&self.pool, name)
            .await?
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;

        let since = chrono::Utc::now() - chrono::Duration::days(window_days);
        let stats =
            PromptTestResultRepo::stats_for_template(&self.pool, template.id, since).await?;

        Ok(analytics::build_report(name, window_days, &stats))
    }
}
