use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::{info, warn};

use crate::models::evaluation::{ReasoningPayload, ScoredJob};
use crate::services::telegram_service::MessageSender;

const LEADERBOARD_SIZE: usize = 3;

const METRIC_LABELS: [(&str, &str); 5] = [
    ("skills_match", "Skills"),
    ("experience_relevance", "Experience"),
    ("keywords_ats", "Keywords"),
    ("career_level_alignment", "Level"),
    ("soft_skills_cultural_fit", "Culture"),
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotifyReport {
    pub sent: usize,
    pub failed: usize,
}

/// Renders and delivers one run's notifications: summary first, then one
/// message per qualifying job, best score first. Individual delivery
/// failures are logged and counted, never fatal to the remaining sends.
#[derive(Clone)]
pub struct NotifyService {
    sender: Arc<dyn MessageSender>,
}

impl NotifyService {
    pub fn new(sender: Arc<dyn MessageSender>) -> Self {
        Self { sender }
    }

    pub async fn dispatch(&self, run_name: &str, jobs: &[ScoredJob]) -> NotifyReport {
        let mut report = NotifyReport::default();

        if jobs.is_empty() {
            info!("No qualifying jobs for run {}, nothing to send", run_name);
            return report;
        }

        let mut ordered: Vec<&ScoredJob> = jobs.iter().collect();
        ordered.sort_by(|a, b| b.avg_score.total_cmp(&a.avg_score));

        let summary = format_summary_message(&ordered, run_name);
        match self.sender.send_message(&summary).await {
            Ok(()) => report.sent += 1,
            Err(e) => {
                warn!("Failed to send run summary: {}", e);
                report.failed += 1;
            }
        }

        let total = ordered.len();
        for (i, job) in ordered.iter().enumerate() {
            let message = format_job_message(job, i + 1, total);
            match self.sender.send_message(&message).await {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    warn!("Failed to send job {}/{} ({}): {}", i + 1, total, job.job_id, e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "Notification dispatch for run {}: {} sent, {} failed",
            run_name, report.sent, report.failed
        );
        report
    }
}

pub fn format_summary_message(jobs: &[&ScoredJob], run_name: &str) -> String {
    let avg_of_avgs = if jobs.is_empty() {
        0.0
    } else {
        jobs.iter().map(|j| j.avg_score).sum::<f64>() / jobs.len() as f64
    };

    let mut message = format!(
        "🎯 <b>JOB SEARCH RESULTS</b>\nRun: <code>{}</code>\n\n\
         Found <b>{}</b> high-quality matches!\nAverage Score: <b>{:.1}/10</b>\n\n\
         <b>Top matches:</b>",
        run_name,
        jobs.len(),
        avg_of_avgs,
    );

    for (i, job) in jobs.iter().take(LEADERBOARD_SIZE).enumerate() {
        message.push_str(&format!(
            "\n{}. {} at {} ({:.1}/10)",
            i + 1,
            job.title,
            job.company.as_deref().unwrap_or("Unknown"),
            job.avg_score,
        ));
    }

    message.push_str(&format!(
        "\n\n📬 Details for all {} jobs coming below...",
        jobs.len()
    ));
    message
}

pub fn format_job_message(job: &ScoredJob, index: usize, total: usize) -> String {
    format!(
        "📊 <b>JOB {}/{} | Score: {:.1}/10</b>\n\n\
         🏢 <b>{}</b>\n🏭 {}\n📍 {}\n\n\
         ⭐ <b>SCORES:</b>\n{}\n\n\
         💡 <b>WHY IT MATCHES:</b>\n{}\n\n\
         🔗 <a href=\"{}\">Apply Now</a>",
        index,
        total,
        job.avg_score,
        job.title,
        job.company.as_deref().unwrap_or("Unknown"),
        job.location.as_deref().unwrap_or("Unknown"),
        render_scores(&job.match_scores),
        render_reasoning(&job.reasoning),
        job.job_url.as_deref().unwrap_or(""),
    )
}

fn render_scores(match_scores: &JsonValue) -> String {
    METRIC_LABELS
        .iter()
        .map(|(metric, label)| {
            let value = match_scores
                .get(*metric)
                .and_then(|v| v.as_i64())
                .map(|v| v.to_string())
                .unwrap_or_else(|| "N/A".to_string());
            format!("- {}: {}", label, value)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Decodes the stored reasoning payload; older or newer evaluator versions
/// may have written a shape this build does not know, in which case the
/// message degrades to the numeric scores plus a generic pointer.
fn render_reasoning(raw: &JsonValue) -> String {
    let payload: ReasoningPayload = match serde_json::from_value(raw.clone()) {
        Ok(p) => p,
        Err(_) => return "See details at the link below.".to_string(),
    };

    let mut lines = vec![format!("Verdict: {}", payload.verdict), payload.summary];
    if !payload.matched_skills.is_empty() {
        lines.push(format!("✅ Matched: {}", payload.matched_skills.join(", ")));
    }
    if !payload.missing_skills.is_empty() {
        lines.push(format!("⚠️ Missing: {}", payload.missing_skills.join(", ")));
    }
    lines.join("\n")
}
