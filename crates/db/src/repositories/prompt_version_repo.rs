//! Repository for the `prompt_versions` table.
//!
//! Version numbers are allocated here, inside the same transaction that
//! inserts the row, so concurrent writers can never hand out the same
//! "next version". The `UNIQUE(template_id, version)` constraint is the
//! storage-layer backstop.

use sqlx::PgPool;
use arcana_core::types::DbId;

use crate::models::prompt::PromptVersion;

/// Column list for prompt_versions queries.
const COLUMNS: &str = "id, template_id, version, encrypted_content, is_active, \
    description, performance_metrics, created_at";

/// Provides CRUD operations for prompt versions.
pub struct PromptVersionRepo;

impl PromptVersionRepo {
    /// Insert the next version for a template and point the template at it.
    ///
    /// One transaction: lock the template row, compute `MAX(version) + 1`,
    /// insert the new (inactive) version, update the template's content and
    /// version pointer. Either everything commits or nothing does. Callers
    /// wrap this in a retry policy for conflict/deadlock errors.
    pub async fn create_next(
        pool: &PgPool,
        template_id: DbId,
        encrypted_content: &str,
        description: Option<&str>,
    ) -> Result<PromptVersion, sqlx::Error> {
        let mut tx = pool.begin().await?;

        // Serialize writers per template; readers are unaffected.
        sqlx::query("SELECT id FROM prompt_templates WHERE id = $1 FOR UPDATE")
            .bind(template_id)
            .fetch_one(&mut *tx)
            .await?;

        let query = format!(
            "INSERT INTO prompt_versions
                (template_id, version, encrypted_content, is_active, description)
             VALUES ($1,
                     COALESCE((SELECT MAX(version) FROM prompt_versions WHERE template_id = $1), 0) + 1,
                     $2, false, $3)
             RETURNING {COLUMNS}"
        );
        let version = sqlx::query_as::<_, PromptVersion>(&query)
            .bind(template_id)
            .bind(encrypted_content)
            .bind(description)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query(
            "UPDATE prompt_templates
             SET encrypted_content = $2, version = $3, updated_at = now()
             WHERE id = $1",
        )
        .bind(template_id)
        .bind(encrypted_content)
        .bind(version.version)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(version)
    }

    /// Atomically make one version the single active one.
    ///
    /// Marks every version of the template inactive, activates the target,
    /// and copies its payload onto the template row. Returns `None` (after
    /// rolling back) if the target version does not exist.
    pub async fn activate(
        pool: &PgPool,
        template_id: DbId,
        version: i32,
    ) -> Result<Option<PromptVersion>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("UPDATE prompt_versions SET is_active = false WHERE template_id = $1")
            .bind(template_id)
            .execute(&mut *tx)
            .await?;

        let query = format!(
            "UPDATE prompt_versions SET is_active = true
             WHERE template_id = $1 AND version = $2
             RETURNING {COLUMNS}"
        );
        let Some(activated) = sqlx::query_as::<_, PromptVersion>(&query)
            .bind(template_id)
            .bind(version)
            .fetch_optional(&mut *tx)
            .await?
        else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query(
            "UPDATE prompt_templates
             SET encrypted_content = $2, version = $3, updated_at = now()
             WHERE id = $1",
        )
        .bind(template_id)
        .bind(&activated.encrypted_content)
        .bind(activated.version)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(activated))
    }

    /// Find a specific version by template and version number.
    pub async fn find_by_template_and_version(
        pool: &PgPool,
        template_id: DbId,
        version: i32,
    ) -> Result<Option<PromptVersion>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM prompt_versions
             WHERE template_id = $1 AND version = $2"
        );
        sqlx::query_as::<_, PromptVersion>(&query)
            .bind(template_id)
            .bind(version)
            .fetch_optional(pool)
            .await
    }

    /// List all versions of a template, newest first.
    pub async fn list_for_template(
        pool: &PgPool,
        template_id: DbId,
    ) -> Result<Vec<PromptVersion>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM prompt_versions
             WHERE template_id = $1
             ORDER BY version DESC"
        );
        sqlx::query_as::<_, PromptVersion>(&query)
            .bind(template_id)
            .fetch_all(pool)
            .await
    }

    /// Count versions currently marked active for a template.
    ///
    /// Invariant check used by tests: must always be exactly one.
    pub async fn count_active(pool: &PgPool, template_id: DbId) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM prompt_versions WHERE template_id = $1 AND is_active = true",
        )
        .bind(template_id)
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }
}
