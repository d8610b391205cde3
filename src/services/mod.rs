pub mod evaluation_service;
pub mod job_service;
pub mod notify_service;
pub mod pipeline_service;
pub mod resume_service;
pub mod scoring_service;
pub mod telegram_service;
