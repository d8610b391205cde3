use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::{Error, Result};
use crate::models::resume::Resume;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResumeStore: Send + Sync {
    /// Body of the most-recently-updated active resume for a profile.
    /// No active resume is fatal for the run.
    async fn active_resume(&self, profile: &str) -> Result<String>;
}

#[derive(Clone)]
pub struct ResumeService {
    pool: PgPool,
}

impl ResumeService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResumeStore for ResumeService {
    async fn active_resume(&self, profile: &str) -> Result<String> {
        let row = sqlx::query_as::<_, Resume>(
            r#"
            SELECT profile, resume_body, is_active, updated_at
            FROM resumes
            WHERE profile = $1
              AND is_active = TRUE
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(profile)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.resume_body).ok_or_else(|| {
            Error::NotFound(format!("No active resume found for profile: {}", profile))
        })
    }
}
