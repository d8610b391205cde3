use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A scraped job posting. Written by the ingestion collaborator and
/// immutable here; `id` is whatever opaque key the scraper assigned.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobPosting {
    pub id: String,
    pub title: String,
    pub company: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub job_url: Option<String>,
    pub job_url_direct: Option<String>,
    pub sys_profile: String,
    pub sys_run_name: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl JobPosting {
    pub fn company_label(&self) -> &str {
        self.company.as_deref().unwrap_or("Unknown")
    }
}
