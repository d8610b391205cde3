use std::sync::Arc;

use tracing::{info, warn};

use crate::models::evaluation::EvaluationResult;
use crate::models::job::JobPosting;
use crate::services::scoring_service::{JobScorer, ScoringContext};

/// Walks a batch of postings through the scoring client. One result per
/// posting, input order preserved. A failed call becomes a zero-score
/// placeholder row instead of aborting the batch; each call already cost
/// network latency and tokens, so the rest of the batch must keep going.
#[derive(Clone)]
pub struct EvaluationService {
    scorer: Arc<dyn JobScorer>,
}

impl EvaluationService {
    pub fn new(scorer: Arc<dyn JobScorer>) -> Self {
        Self { scorer }
    }

    pub async fn evaluate_batch(
        &self,
        context: &ScoringContext,
        jobs: &[JobPosting],
    ) -> Vec<EvaluationResult> {
        let mut results = Vec::with_capacity(jobs.len());

        for (idx, job) in jobs.iter().enumerate() {
            info!(
                "Evaluating job {}/{}: {}",
                idx + 1,
                jobs.len(),
                job.company_label()
            );

            match self.scorer.score_job(context, job).await {
                Ok(output) => results.push(EvaluationResult::scored(&job.id, output)),
                Err(e) => {
                    warn!("Scoring failed for job {}: {}", job.id, e);
                    results.push(EvaluationResult::placeholder(&job.id, &e.to_string()));
                }
            }
        }

        results
    }
}
