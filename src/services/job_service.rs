use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::Result;
use crate::models::evaluation::{EvaluationResult, ScoredJob};
use crate::models::job::JobPosting;

/// Store contract the orchestrator runs against.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Most-recently-ingested postings for a profile that have no
    /// evaluation row yet, newest first. The returned set stays disjoint
    /// from everything already evaluated, under any run history, which is
    /// what makes re-running the pipeline safe.
    async fn select_unevaluated(&self, profile: &str, limit: i64) -> Result<Vec<JobPosting>>;

    /// Append-only bulk insert of one run's evaluation rows. Existing rows
    /// are never touched.
    async fn insert_evaluations(&self, results: &[EvaluationResult]) -> Result<u64>;

    /// Evaluations for one run at or above the threshold, joined to their
    /// postings, best score first.
    async fn top_scored(&self, run_name: &str, min_score: f64) -> Result<Vec<ScoredJob>>;
}

#[derive(Clone)]
pub struct JobService {
    pool: PgPool,
}

impl JobService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for JobService {
    async fn select_unevaluated(&self, profile: &str, limit: i64) -> Result<Vec<JobPosting>> {
        let jobs = sqlx::query_as::<_, JobPosting>(
            r#"
            SELECT id, title, company, location, description,
                   job_url, job_url_direct, sys_profile, sys_run_name, created_at
            FROM scraped_jobs j
            WHERE sys_profile = $1
              AND NOT EXISTS (
                  SELECT 1 FROM evaluated_jobs e WHERE e.job_id = j.id
              )
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(profile)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(jobs)
    }

    async fn insert_evaluations(&self, results: &[EvaluationResult]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        for result in results {
            sqlx::query(
                r#"
                INSERT INTO evaluated_jobs
                    (job_id, match_scores, avg_score, reasoning, sys_run_name, sys_profile)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(&result.job_id)
            .bind(serde_json::to_value(&result.match_scores)?)
            .bind(result.avg_score)
            .bind(&result.reasoning)
            .bind(&result.sys_run_name)
            .bind(&result.sys_profile)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(results.len() as u64)
    }

    async fn top_scored(&self, run_name: &str, min_score: f64) -> Result<Vec<ScoredJob>> {
        let jobs = sqlx::query_as::<_, ScoredJob>(
            r#"
            SELECT
                e.job_id,
                j.title,
                j.company,
                j.location,
                e.avg_score,
                e.match_scores,
                e.reasoning,
                COALESCE(j.job_url_direct, j.job_url) AS job_url
            FROM evaluated_jobs e
            INNER JOIN scraped_jobs j ON e.job_id = j.id
            WHERE e.sys_run_name = $1
              AND e.avg_score >= $2
            ORDER BY e.avg_score DESC
            "#,
        )
        .bind(run_name)
        .bind(min_score)
        .fetch_all(&self.pool)
        .await?;

        Ok(jobs)
    }
}
