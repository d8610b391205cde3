use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// An uploaded resume, scoped to one candidate profile. Only the
/// most-recently-updated active row per profile is ever used.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Resume {
    pub profile: String,
    pub resume_body: String,
    pub is_active: bool,
    pub updated_at: Option<DateTime<Utc>>,
}
