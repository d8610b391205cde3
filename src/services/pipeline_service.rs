use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::config::RunConfig;
use crate::error::Result;
use crate::services::evaluation_service::EvaluationService;
use crate::services::job_service::JobStore;
use crate::services::notify_service::NotifyService;
use crate::services::resume_service::ResumeStore;
use crate::services::scoring_service::ScoringService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Selecting,
    Evaluating,
    Persisting,
    Notifying,
}

impl std::fmt::Display for RunStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunStage::Selecting => "selecting",
            RunStage::Evaluating => "evaluating",
            RunStage::Persisting => "persisting",
            RunStage::Notifying => "notifying",
        };
        write!(f, "{}", name)
    }
}

/// Outcome counts for one pipeline invocation. A degraded run (some
/// scoring or notification failures) still completes and reports them here.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub run_name: String,
    pub profile: String,
    pub selected: usize,
    pub evaluated: usize,
    pub scoring_failures: usize,
    pub persisted: u64,
    pub notified: usize,
    pub notify_failures: usize,
}

/// Sequences one run: resume fetch and selection, batch evaluation,
/// append-only persistence, notification. Stages are strictly sequential
/// and non-retrying; a stage failure surfaces tagged with its stage, and
/// the whole pipeline is simply re-invoked to retry (the selector's
/// anti-join makes that safe).
///
/// Two runs for the same profile must not execute concurrently; nothing in
/// here serializes them.
#[derive(Clone)]
pub struct PipelineService {
    job_store: Arc<dyn JobStore>,
    resume_store: Arc<dyn ResumeStore>,
    scoring_service: ScoringService,
    evaluation_service: EvaluationService,
    notify_service: NotifyService,
}

impl PipelineService {
    pub fn new(
        job_store: Arc<dyn JobStore>,
        resume_store: Arc<dyn ResumeStore>,
        scoring_service: ScoringService,
        evaluation_service: EvaluationService,
        notify_service: NotifyService,
    ) -> Self {
        Self {
            job_store,
            resume_store,
            scoring_service,
            evaluation_service,
            notify_service,
        }
    }

    pub async fn run(&self, run: &RunConfig, run_name: &str) -> Result<RunReport> {
        info!("Starting pipeline run {} for profile {}", run_name, run.profile);

        let mut report = RunReport {
            run_name: run_name.to_string(),
            profile: run.profile.clone(),
            ..RunReport::default()
        };

        let resume = self
            .resume_store
            .active_resume(&run.profile)
            .await
            .map_err(|e| e.at_stage(RunStage::Selecting))?;
        info!("Loaded resume: {} characters", resume.len());

        let jobs = self
            .job_store
            .select_unevaluated(&run.profile, run.batch_limit)
            .await
            .map_err(|e| e.at_stage(RunStage::Selecting))?;
        report.selected = jobs.len();
        info!("Selected {} unevaluated jobs", jobs.len());

        if jobs.is_empty() && !run.notify_on_empty {
            info!("Nothing selected for run {}, finishing early", run_name);
            return Ok(report);
        }

        if !jobs.is_empty() {
            let context = self
                .scoring_service
                .build_context(&run.model_identifier, &resume);
            info!(stage = %RunStage::Evaluating, "Evaluating batch of {} jobs", jobs.len());

            let results = self.evaluation_service.evaluate_batch(&context, &jobs).await;
            report.evaluated = results.len();
            report.scoring_failures = results.iter().filter(|r| r.is_placeholder()).count();

            let tagged: Vec<_> = results
                .into_iter()
                .map(|r| r.tagged(run_name, &run.profile))
                .collect();
            report.persisted = self
                .job_store
                .insert_evaluations(&tagged)
                .await
                .map_err(|e| e.at_stage(RunStage::Persisting))?;
            info!("Persisted {} evaluation rows", report.persisted);
        }

        let scored = self
            .job_store
            .top_scored(run_name, run.min_score_threshold)
            .await
            .map_err(|e| e.at_stage(RunStage::Notifying))?;
        info!(
            "Found {} jobs at or above threshold {}",
            scored.len(),
            run.min_score_threshold
        );

        let notify_report = self.notify_service.dispatch(run_name, &scored).await;
        report.notified = notify_report.sent;
        report.notify_failures = notify_report.failed;

        info!("Pipeline run {} done", run_name);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::models::evaluation::{
        EvaluationOutput, ReasoningPayload, ScoredJob, REQUIRED_METRICS,
    };
    use crate::models::job::JobPosting;
    use crate::services::job_service::MockJobStore;
    use crate::services::resume_service::MockResumeStore;
    use crate::services::scoring_service::MockJobScorer;
    use crate::services::telegram_service::MockMessageSender;
    use reqwest::Client;
    use std::collections::BTreeMap;

    fn posting(id: &str) -> JobPosting {
        JobPosting {
            id: id.to_string(),
            title: format!("Role {}", id),
            company: Some("Acme".to_string()),
            location: Some("Toronto, ON".to_string()),
            description: Some("Build pipelines".to_string()),
            job_url: Some(format!("https://example.com/{}", id)),
            job_url_direct: None,
            sys_profile: "Acme-Eng".to_string(),
            sys_run_name: "run-x".to_string(),
            created_at: None,
        }
    }

    fn scored_job(id: &str, avg: f64) -> ScoredJob {
        ScoredJob {
            job_id: id.to_string(),
            title: format!("Role {}", id),
            company: Some("Acme".to_string()),
            location: Some("Toronto, ON".to_string()),
            avg_score: avg,
            match_scores: serde_json::json!({}),
            reasoning: serde_json::json!({
                "verdict": "Slightly Higher",
                "summary": "Good fit.",
                "matched_skills": [],
                "missing_skills": []
            }),
            job_url: Some(format!("https://example.com/{}", id)),
        }
    }

    fn uniform_output(score: i64) -> EvaluationOutput {
        EvaluationOutput {
            match_scores: REQUIRED_METRICS
                .iter()
                .map(|m| (m.to_string(), score))
                .collect::<BTreeMap<_, _>>(),
            reasoning: ReasoningPayload {
                verdict: "Lateral Move".to_string(),
                summary: "Comparable role.".to_string(),
                matched_skills: vec![],
                missing_skills: vec![],
                extra: serde_json::Map::new(),
            },
        }
    }

    fn run_config() -> RunConfig {
        RunConfig {
            profile: "Acme-Eng".to_string(),
            min_score_threshold: 7.0,
            batch_limit: 30,
            model_identifier: "claude-3-haiku-20240307".to_string(),
            notify_on_empty: false,
        }
    }

    fn scoring_service() -> ScoringService {
        ScoringService::new(
            "test-key".to_string(),
            "- Level: Lead Data Engineer".to_string(),
            Client::new(),
        )
    }

    fn pipeline(
        job_store: MockJobStore,
        resume_store: MockResumeStore,
        scorer: MockJobScorer,
        sender: MockMessageSender,
    ) -> PipelineService {
        PipelineService::new(
            Arc::new(job_store),
            Arc::new(resume_store),
            scoring_service(),
            EvaluationService::new(Arc::new(scorer)),
            NotifyService::new(Arc::new(sender)),
        )
    }

    fn resume_store_with(body: &str) -> MockResumeStore {
        let body = body.to_string();
        let mut store = MockResumeStore::new();
        store
            .expect_active_resume()
            .returning(move |_| Ok(body.clone()));
        store
    }

    #[tokio::test]
    async fn run_walks_select_evaluate_persist_notify_and_counts() {
        let mut job_store = MockJobStore::new();
        job_store
            .expect_select_unevaluated()
            .withf(|profile, limit| profile == "Acme-Eng" && *limit == 30)
            .times(1)
            .returning(|_, _| Ok(vec![posting("job-1"), posting("job-2")]));
        job_store
            .expect_insert_evaluations()
            .withf(|rows| {
                rows.len() == 2
                    && rows
                        .iter()
                        .all(|r| r.sys_run_name == "run-42" && r.sys_profile == "Acme-Eng")
            })
            .times(1)
            .returning(|rows| Ok(rows.len() as u64));
        job_store
            .expect_top_scored()
            .withf(|run_name, min| run_name == "run-42" && (*min - 7.0).abs() < f64::EPSILON)
            .times(1)
            .returning(|_, _| Ok(vec![scored_job("job-1", 8.0)]));

        let mut scorer = MockJobScorer::new();
        scorer
            .expect_score_job()
            .times(2)
            .returning(|_, job| match job.id.as_str() {
                "job-2" => Err(Error::Scoring("network timeout".to_string())),
                _ => Ok(uniform_output(8)),
            });

        let mut sender = MockMessageSender::new();
        // Summary plus one job message.
        sender.expect_send_message().times(2).returning(|_| Ok(()));

        let service = pipeline(job_store, resume_store_with("resume body"), scorer, sender);
        let report = service.run(&run_config(), "run-42").await.unwrap();

        assert_eq!(report.selected, 2);
        assert_eq!(report.evaluated, 2);
        assert_eq!(report.scoring_failures, 1);
        assert_eq!(report.persisted, 2);
        assert_eq!(report.notified, 2);
        assert_eq!(report.notify_failures, 0);
    }

    #[tokio::test]
    async fn empty_selection_finishes_early_without_touching_later_stages() {
        let mut job_store = MockJobStore::new();
        job_store
            .expect_select_unevaluated()
            .times(1)
            .returning(|_, _| Ok(vec![]));
        job_store.expect_insert_evaluations().times(0);
        job_store.expect_top_scored().times(0);

        let mut sender = MockMessageSender::new();
        sender.expect_send_message().times(0);

        let service = pipeline(
            job_store,
            resume_store_with("resume body"),
            MockJobScorer::new(),
            sender,
        );
        let report = service.run(&run_config(), "run-42").await.unwrap();

        assert_eq!(report.selected, 0);
        assert_eq!(report.evaluated, 0);
        assert_eq!(report.persisted, 0);
        assert_eq!(report.notified, 0);
    }

    #[tokio::test]
    async fn notify_on_empty_still_reads_earlier_scores() {
        let mut job_store = MockJobStore::new();
        job_store
            .expect_select_unevaluated()
            .times(1)
            .returning(|_, _| Ok(vec![]));
        job_store.expect_insert_evaluations().times(0);
        job_store
            .expect_top_scored()
            .times(1)
            .returning(|_, _| Ok(vec![scored_job("job-9", 9.0)]));

        let mut sender = MockMessageSender::new();
        sender.expect_send_message().times(2).returning(|_| Ok(()));

        let mut run = run_config();
        run.notify_on_empty = true;

        let service = pipeline(
            job_store,
            resume_store_with("resume body"),
            MockJobScorer::new(),
            sender,
        );
        let report = service.run(&run, "run-42").await.unwrap();

        assert_eq!(report.selected, 0);
        assert_eq!(report.persisted, 0);
        assert_eq!(report.notified, 2);
    }

    #[tokio::test]
    async fn missing_resume_fails_the_run_at_selecting() {
        let mut resume_store = MockResumeStore::new();
        resume_store.expect_active_resume().returning(|profile| {
            Err(Error::NotFound(format!(
                "No active resume found for profile: {}",
                profile
            )))
        });

        let mut job_store = MockJobStore::new();
        job_store.expect_select_unevaluated().times(0);

        let service = pipeline(
            job_store,
            resume_store,
            MockJobScorer::new(),
            MockMessageSender::new(),
        );
        let err = service.run(&run_config(), "run-42").await.unwrap_err();

        let rendered = err.to_string();
        assert!(rendered.contains("selecting"));
        assert!(rendered.contains("No active resume"));
    }

    #[tokio::test]
    async fn persistence_failure_is_tagged_with_its_stage() {
        let mut job_store = MockJobStore::new();
        job_store
            .expect_select_unevaluated()
            .returning(|_, _| Ok(vec![posting("job-1")]));
        job_store
            .expect_insert_evaluations()
            .returning(|_| Err(Error::Database(sqlx::Error::PoolTimedOut)));
        job_store.expect_top_scored().times(0);

        let mut scorer = MockJobScorer::new();
        scorer
            .expect_score_job()
            .returning(|_, _| Ok(uniform_output(8)));

        let service = pipeline(
            job_store,
            resume_store_with("resume body"),
            scorer,
            MockMessageSender::new(),
        );
        let err = service.run(&run_config(), "run-42").await.unwrap_err();
        assert!(err.to_string().contains("persisting"));
    }

    #[test]
    fn stage_names_match_the_run_lifecycle() {
        assert_eq!(RunStage::Selecting.to_string(), "selecting");
        assert_eq!(RunStage::Evaluating.to_string(), "evaluating");
        assert_eq!(RunStage::Persisting.to_string(), "persisting");
        assert_eq!(RunStage::Notifying.to_string(), "notifying");
    }

    #[test]
    fn stage_tagged_errors_name_stage_and_cause() {
        let err = Error::NotFound("No active resume found for profile: Acme-Eng".to_string())
            .at_stage(RunStage::Selecting);
        let rendered = err.to_string();
        assert!(rendered.contains("selecting"));
        assert!(rendered.contains("No active resume"));
    }
}
