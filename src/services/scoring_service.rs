use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};
use crate::models::evaluation::{
    EvaluationOutput, REQUIRED_METRICS, SCORE_MAX, SCORE_MIN,
};
use crate::models::job::JobPosting;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const EVALUATION_TOOL: &str = "record_job_evaluation";
const MAX_DESCRIPTION_CHARS: usize = 4000;

const SCORING_RUBRIC: &str = r#"SCORING (1-10):
1. skills_match: stack alignment with the resume.
2. experience_relevance: problem and domain fit.
3. keywords_ats: keyword overlap a screening system would see.
4. career_level_alignment: 10 = clear step up, 5 = lateral move, 1 = demotion.
5. soft_skills_cultural_fit: culture fit signals in the posting.

For the verdict, use natural language like "Slightly Higher", "Massive Pay Jump",
"Lateral Move", "Lower", "Different Stack".

Record your evaluation with the record_job_evaluation tool."#;

/// Reusable evaluation context: fixed scoring instructions plus the resume,
/// assembled once per run. The resume block carries an ephemeral cache
/// marker so the service can reuse it across the batch's calls; correctness
/// does not depend on the cache being honored.
#[derive(Debug, Clone)]
pub struct ScoringContext {
    pub model: String,
    pub system: JsonValue,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobScorer: Send + Sync {
    async fn score_job(
        &self,
        context: &ScoringContext,
        job: &JobPosting,
    ) -> Result<EvaluationOutput>;
}

#[derive(Clone)]
pub struct ScoringService {
    client: Client,
    api_key: String,
    baseline: String,
}

impl ScoringService {
    pub fn new(api_key: String, baseline: String, client: Client) -> Self {
        Self {
            client,
            api_key,
            baseline,
        }
    }

    pub fn build_context(&self, model: &str, resume: &str) -> ScoringContext {
        let instructions = format!(
            "You are a career agent. Compare roles to the candidate's resume and current baseline.\n\n\
             CANDIDATE BASELINE:\n{}\n\n{}",
            self.baseline, SCORING_RUBRIC,
        );
        ScoringContext {
            model: model.to_string(),
            system: serde_json::json!([
                {
                    "type": "text",
                    "text": instructions,
                },
                {
                    "type": "text",
                    "text": format!("RESUME:\n{}", resume),
                    "cache_control": { "type": "ephemeral" },
                }
            ]),
        }
    }

    async fn call_scoring_api(&self, payload: &JsonValue) -> Result<JsonValue> {
        let res = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(payload)
            .send()
            .await
            .map_err(|e| Error::Scoring(format!("request failed: {}", e)))?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(Error::Scoring(format!(
                "scoring API error {}: {}",
                status, text
            )));
        }

        res.json::<JsonValue>()
            .await
            .map_err(|e| Error::Scoring(format!("invalid response body: {}", e)))
    }
}

#[async_trait]
impl JobScorer for ScoringService {
    async fn score_job(
        &self,
        context: &ScoringContext,
        job: &JobPosting,
    ) -> Result<EvaluationOutput> {
        let payload = serde_json::json!({
            "model": context.model,
            "max_tokens": 1024,
            "system": context.system,
            "tools": [{
                "name": EVALUATION_TOOL,
                "description": "Record the structured evaluation of one job posting against the resume.",
                "input_schema": evaluation_schema(),
            }],
            "tool_choice": { "type": "tool", "name": EVALUATION_TOOL },
            "messages": [{ "role": "user", "content": job_prompt(job) }],
        });

        let body = self.call_scoring_api(&payload).await?;
        let input = extract_tool_input(&body)?;
        let output: EvaluationOutput = serde_json::from_value(input)
            .map_err(|e| Error::Scoring(format!("response failed schema decode: {}", e)))?;
        output.validated()
    }
}

/// JSON Schema submitted with the forced tool call. The scoring service is
/// told the exact metric names and bounds up front instead of being trusted
/// to format free text correctly.
fn evaluation_schema() -> JsonValue {
    let mut metric_props = serde_json::Map::new();
    for metric in REQUIRED_METRICS {
        metric_props.insert(
            metric.to_string(),
            serde_json::json!({
                "type": "integer",
                "minimum": SCORE_MIN,
                "maximum": SCORE_MAX,
            }),
        );
    }

    serde_json::json!({
        "type": "object",
        "properties": {
            "match_scores": {
                "type": "object",
                "properties": metric_props,
                "required": REQUIRED_METRICS,
                "additionalProperties": false,
            },
            "reasoning": {
                "type": "object",
                "properties": {
                    "verdict": {
                        "type": "string",
                        "description": "Short natural-language verdict on the move",
                    },
                    "matched_skills": {
                        "type": "array",
                        "items": { "type": "string" },
                        "maxItems": 5,
                    },
                    "missing_skills": {
                        "type": "array",
                        "items": { "type": "string" },
                        "maxItems": 3,
                    },
                    "summary": {
                        "type": "string",
                        "description": "One sentence on overall fit",
                    },
                },
                "required": ["verdict", "matched_skills", "missing_skills", "summary"],
            },
        },
        "required": ["match_scores", "reasoning"],
    })
}

fn job_prompt(job: &JobPosting) -> String {
    format!(
        "JOB:\nCompany: {}\nTitle: {}\n{}",
        job.company_label(),
        job.title,
        truncate_chars(job.description.as_deref().unwrap_or(""), MAX_DESCRIPTION_CHARS),
    )
}

fn extract_tool_input(body: &JsonValue) -> Result<JsonValue> {
    body.get("content")
        .and_then(|c| c.as_array())
        .and_then(|blocks| {
            blocks
                .iter()
                .find(|b| b.get("type").and_then(|t| t.as_str()) == Some("tool_use"))
        })
        .and_then(|b| b.get("input"))
        .cloned()
        .ok_or_else(|| Error::Scoring("response carried no tool_use block".to_string()))
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
