//! Repository for the `prompt_templates` table.

use sqlx::PgPool;

use crate::models::prompt::{PromptTemplate, PromptVersion};

/// Column list for prompt_templates queries.
const COLUMNS: &str = "id, name, encrypted_content, version, is_active, description, \
    performance_notes, created_at, updated_at";

/// Column list for prompt_versions rows returned from the create transaction.
const VERSION_COLUMNS: &str = "id, template_id, version, encrypted_content, is_active, \
    description, performance_metrics, created_at";

/// Provides CRUD operations for prompt templates.
pub struct PromptTemplateRepo;

impl PromptTemplateRepo {
    /// Create a template together with its first, already-active version.
    ///
    /// Both rows commit atomically; the template mirrors version 1's content
    /// from the start.
    pub async fn create(
        pool: &PgPool,
        name: &str,
        encrypted_content: &str,
        description: Option<&str>,
    ) -> Result<PromptTemplate, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "INSERT INTO prompt_templates (name, encrypted_content, version, is_active, description)
             VALUES ($1, $2, 1, true, $3)
             RETURNING {COLUMNS}"
        );
        let template = sqlx::query_as::<_, PromptTemplate>(&query)
            .bind(name)
            .bind(encrypted_content)
            .bind(description)
            .fetch_one(&mut *tx)
            .await?;

        let query = format!(
            "INSERT INTO prompt_versions (template_id, version, encrypted_content, is_active, description)
             VALUES ($1, 1, $2, true, $3)
             RETURNING {VERSION_COLUMNS}"
        );
        sqlx::query_as::<_, PromptVersion>(&query)
            .bind(template.id)
            .bind(encrypted_content)
            .bind(description)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(template)
    }

    /// Find a template by its unique name, active or not.
    pub async fn find_by_name(
        pool: &PgPool,
        name: &str,
    ) -> Result<Option<PromptTemplate>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM prompt_templates WHERE name = $1");
        sqlx::query_as::<_, PromptTemplate>(&query)
            .bind(name)
            .fetch_optional(pool)
            .await
    }

    /// Find an active template by name. Retired templates are invisible here.
    pub async fn find_active_by_name(
        pool: &PgPool,
        name: &str,
    ) -> Result<Option<PromptTemplate>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM prompt_templates WHERE name = $1 AND is_active = true");
        sqlx::query_as::<_, PromptTemplate>(&query)
            .bind(name)
            .fetch_optional(pool)
            .await
    }

    /// Flip a template's `is_active` flag. Returns the updated row if the
    /// template exists. Version history is untouched.
    pub async fn set_active(
        pool: &PgPool,
        name: &str,
        is_active: bool,
    ) -> Result<Option<PromptTemplate>, sqlx::Error> {
        let query = format!(
            "UPDATE prompt_templates SET is_active = $2, updated_at = now()
             WHERE name = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PromptTemplate>(&query)
            .bind(name)
            .bind(is_active)
            .fetch_optional(pool)
            .await
    }

    /// List templates ordered by name ascending.
    pub async fn list(
        pool: &PgPool,
        include_inactive: bool,
    ) -> Result<Vec<PromptTemplate>, sqlx::Error> {
        let query = if include_inactive {
            format!("SELECT {COLUMNS} FROM prompt_templates ORDER BY name ASC")
        } else {
            format!(
                "SELECT {COLUMNS} FROM prompt_templates WHERE is_active = true ORDER BY name ASC"
            )
        };
        sqlx::query_as::<_, PromptTemplate>(&query)
            .fetch_all(pool)
            .await
    }
}
