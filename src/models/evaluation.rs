use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;

use crate::error::{Error, Result};

/// Metric set is fixed per deployment; the scoring schema and the
/// client-side validation both key off this list.
pub const REQUIRED_METRICS: [&str; 5] = [
    "skills_match",
    "experience_relevance",
    "keywords_ats",
    "career_level_alignment",
    "soft_skills_cultural_fit",
];

pub const SCORE_MIN: i64 = 1;
pub const SCORE_MAX: i64 = 10;

pub const MAX_MATCHED_SKILLS: usize = 5;
pub const MAX_MISSING_SKILLS: usize = 3;

/// Structured reasoning attached to a score. The core fields (verdict,
/// summary) are stable across scoring-service versions; anything a newer
/// version adds lands in `extra` instead of breaking the decode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningPayload {
    pub verdict: String,
    pub summary: String,
    #[serde(default)]
    pub matched_skills: Vec<String>,
    #[serde(default)]
    pub missing_skills: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, JsonValue>,
}

impl ReasoningPayload {
    pub fn failure(summary: impl Into<String>) -> Self {
        Self {
            verdict: "Evaluation Failed".to_string(),
            summary: summary.into(),
            matched_skills: vec![],
            missing_skills: vec![],
            extra: serde_json::Map::new(),
        }
    }
}

/// What the scoring service hands back for one job: the full metric map
/// plus the reasoning payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationOutput {
    pub match_scores: BTreeMap<String, i64>,
    pub reasoning: ReasoningPayload,
}

impl EvaluationOutput {
    /// Re-checks the schema constraints on the client side: every required
    /// metric present (and nothing else), every score in range. Skill lists
    /// are clamped to their caps rather than rejected.
    pub fn validated(mut self) -> Result<Self> {
        for metric in REQUIRED_METRICS {
            match self.match_scores.get(metric) {
                None => {
                    return Err(Error::Scoring(format!("missing metric '{}'", metric)));
                }
                Some(&v) if !(SCORE_MIN..=SCORE_MAX).contains(&v) => {
                    return Err(Error::Scoring(format!(
                        "metric '{}' out of range: {}",
                        metric, v
                    )));
                }
                Some(_) => {}
            }
        }
        if self.match_scores.len() != REQUIRED_METRICS.len() {
            let unexpected: Vec<&str> = self
                .match_scores
                .keys()
                .filter(|k| !REQUIRED_METRICS.contains(&k.as_str()))
                .map(|k| k.as_str())
                .collect();
            return Err(Error::Scoring(format!(
                "unexpected metrics in response: {}",
                unexpected.join(", ")
            )));
        }
        self.reasoning.matched_skills.truncate(MAX_MATCHED_SKILLS);
        self.reasoning.missing_skills.truncate(MAX_MISSING_SKILLS);
        Ok(self)
    }
}

/// One evaluated job, as persisted to `evaluated_jobs`. At most one row
/// exists per job id across all runs; the selector never hands out a job
/// that already has one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub job_id: String,
    pub match_scores: BTreeMap<String, i64>,
    pub avg_score: f64,
    pub reasoning: JsonValue,
    pub sys_run_name: String,
    pub sys_profile: String,
}

impl EvaluationResult {
    pub fn scored(job_id: &str, output: EvaluationOutput) -> Self {
        let avg_score = mean_score(&output.match_scores);
        Self {
            job_id: job_id.to_string(),
            match_scores: output.match_scores,
            avg_score,
            reasoning: serde_json::to_value(&output.reasoning)
                .unwrap_or_else(|_| JsonValue::Null),
            sys_run_name: String::new(),
            sys_profile: String::new(),
        }
    }

    /// Zero-score stand-in recorded when scoring a job fails, so the batch
    /// keeps its 1:1 job-to-result shape and the job is never re-selected.
    pub fn placeholder(job_id: &str, reason: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            match_scores: BTreeMap::new(),
            avg_score: 0.0,
            reasoning: serde_json::to_value(ReasoningPayload::failure(reason))
                .unwrap_or_else(|_| JsonValue::Null),
            sys_run_name: String::new(),
            sys_profile: String::new(),
        }
    }

    pub fn tagged(mut self, run_name: &str, profile: &str) -> Self {
        self.sys_run_name = run_name.to_string();
        self.sys_profile = profile.to_string();
        self
    }

    pub fn is_placeholder(&self) -> bool {
        self.match_scores.is_empty()
    }
}

fn mean_score(scores: &BTreeMap<String, i64>) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    scores.values().sum::<i64>() as f64 / scores.len() as f64
}

/// An evaluation row joined back to its posting, as read for notification.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScoredJob {
    pub job_id: String,
    pub title: String,
    pub company: Option<String>,
    pub location: Option<String>,
    pub avg_score: f64,
    pub match_scores: JsonValue,
    pub reasoning: JsonValue,
    pub job_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_scores() -> BTreeMap<String, i64> {
        REQUIRED_METRICS
            .iter()
            .enumerate()
            .map(|(i, m)| (m.to_string(), (i as i64 % 10) + 1))
            .collect()
    }

    fn output_with(scores: BTreeMap<String, i64>) -> EvaluationOutput {
        EvaluationOutput {
            match_scores: scores,
            reasoning: ReasoningPayload {
                verdict: "Lateral Move".to_string(),
                summary: "Similar scope, similar stack.".to_string(),
                matched_skills: vec!["SQL".to_string()],
                missing_skills: vec![],
                extra: serde_json::Map::new(),
            },
        }
    }

    #[test]
    fn average_is_mean_of_metric_values() {
        let mut scores = BTreeMap::new();
        for m in REQUIRED_METRICS {
            scores.insert(m.to_string(), 8);
        }
        scores.insert("skills_match".to_string(), 3);
        let result = EvaluationResult::scored("job-1", output_with(scores));
        assert!((result.avg_score - 7.0).abs() < f64::EPSILON);
        assert!(!result.is_placeholder());
    }

    #[test]
    fn placeholder_has_empty_map_and_zero_average() {
        let result = EvaluationResult::placeholder("job-2", "network timeout");
        assert!(result.is_placeholder());
        assert_eq!(result.avg_score, 0.0);
        assert!(result.match_scores.is_empty());
        assert_eq!(result.reasoning["verdict"], "Evaluation Failed");
        assert_eq!(result.reasoning["summary"], "network timeout");
    }

    #[test]
    fn tagged_sets_run_and_profile() {
        let result =
            EvaluationResult::placeholder("job-3", "x").tagged("run-abc", "Acme-Eng");
        assert_eq!(result.sys_run_name, "run-abc");
        assert_eq!(result.sys_profile, "Acme-Eng");
    }

    #[test]
    fn validation_accepts_full_in_range_scores() {
        let out = output_with(full_scores()).validated().unwrap();
        assert_eq!(out.match_scores.len(), REQUIRED_METRICS.len());
    }

    #[test]
    fn validation_rejects_missing_metric() {
        let mut scores = full_scores();
        scores.remove("keywords_ats");
        let err = output_with(scores).validated().unwrap_err();
        assert!(err.to_string().contains("keywords_ats"));
    }

    #[test]
    fn validation_rejects_out_of_range_score() {
        let mut scores = full_scores();
        scores.insert("skills_match".to_string(), 11);
        let err = output_with(scores).validated().unwrap_err();
        assert!(err.to_string().contains("out of range"));

        let mut scores = full_scores();
        scores.insert("skills_match".to_string(), 0);
        assert!(output_with(scores).validated().is_err());
    }

    #[test]
    fn validation_rejects_unexpected_metric() {
        let mut scores = full_scores();
        scores.insert("vibes".to_string(), 5);
        let err = output_with(scores).validated().unwrap_err();
        assert!(err.to_string().contains("vibes"));
    }

    #[test]
    fn validation_clamps_skill_lists() {
        let mut out = output_with(full_scores());
        out.reasoning.matched_skills = (0..8).map(|i| format!("skill-{}", i)).collect();
        out.reasoning.missing_skills = (0..5).map(|i| format!("gap-{}", i)).collect();
        let out = out.validated().unwrap();
        assert_eq!(out.reasoning.matched_skills.len(), MAX_MATCHED_SKILLS);
        assert_eq!(out.reasoning.missing_skills.len(), MAX_MISSING_SKILLS);
    }

    #[test]
    fn reasoning_keeps_unknown_fields_in_extra() {
        let payload: ReasoningPayload = serde_json::from_value(json!({
            "verdict": "Slightly Higher",
            "summary": "Pay bump, same stack.",
            "matched_skills": ["Rust"],
            "missing_skills": [],
            "confidence": 0.92,
            "comparisons": [{"category": "Salary", "verdict": "Higher"}]
        }))
        .unwrap();
        assert_eq!(payload.verdict, "Slightly Higher");
        assert!(payload.extra.contains_key("confidence"));
        assert!(payload.extra.contains_key("comparisons"));

        // Round-trips with the extras flattened back to the top level.
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["confidence"], 0.92);
    }

    #[test]
    fn reasoning_decode_fails_without_core_fields() {
        let res: std::result::Result<ReasoningPayload, _> =
            serde_json::from_value(json!([{"category": "Salary"}]));
        assert!(res.is_err());
    }
}
