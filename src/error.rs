use crate::services::pipeline_service::RunStage;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Scoring failed: {0}")]
    Scoring(String),

    #[error("Notification failed: {0}")]
    Notification(String),

    #[error("Pipeline failed during {stage}: {source}")]
    Pipeline {
        stage: RunStage,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Tags an error with the pipeline stage it occurred in.
    pub fn at_stage(self, stage: RunStage) -> Self {
        Error::Pipeline {
            stage,
            source: Box::new(self),
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Error::NotFound("Resource not found".to_string()),
            other => Error::Database(other),
        }
    }
}
