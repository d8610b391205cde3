pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod services;

use std::sync::Arc;

use crate::services::{
    evaluation_service::EvaluationService, job_service::JobService,
    notify_service::NotifyService, pipeline_service::PipelineService,
    resume_service::ResumeService, scoring_service::ScoringService,
    telegram_service::TelegramService,
};
use reqwest::Client;
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub job_service: JobService,
    pub resume_service: ResumeService,
    pub scoring_service: ScoringService,
    pub evaluation_service: EvaluationService,
    pub notify_service: NotifyService,
    pub pipeline_service: PipelineService,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        let config = crate::config::get_config();
        let scoring_client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .unwrap();
        let telegram_client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap();

        let job_service = JobService::new(pool.clone());
        let resume_service = ResumeService::new(pool.clone());
        let scoring_service = ScoringService::new(
            config.anthropic_api_key.clone(),
            config.candidate_baseline.clone(),
            scoring_client,
        );
        let evaluation_service = EvaluationService::new(Arc::new(scoring_service.clone()));
        let telegram_service = TelegramService::new(
            config.telegram_bot_token.clone(),
            config.telegram_chat_id.clone(),
            telegram_client,
        );
        let notify_service = NotifyService::new(Arc::new(telegram_service));
        let pipeline_service = PipelineService::new(
            Arc::new(job_service.clone()),
            Arc::new(resume_service.clone()),
            scoring_service.clone(),
            evaluation_service.clone(),
            notify_service.clone(),
        );

        Self {
            pool,
            job_service,
            resume_service,
            scoring_service,
            evaluation_service,
            notify_service,
            pipeline_service,
        }
    }
}
