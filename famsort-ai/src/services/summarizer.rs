//! Per-respondent profile summarization
//!
//! Compresses whatever readable answers remain after pseudonymization into a
//! short profile. Calls are sequential, one per respondent, in table order.
//! A failed call never aborts the run: the respondent gets
//! [`SUMMARY_FAILED`] and is later left out of classification.

use crate::types::{Profile, ProfileSummarizer, SUMMARY_FAILED};
use famsort_common::config::USER_ID_COLUMN;
use famsort_common::identifier::is_identifier;
use famsort_common::{RespondentTable, Result};
use std::collections::HashSet;

/// Output of [`summarize_respondents`]
#[derive(Debug, Clone, Default)]
pub struct SummaryReport {
    /// One profile per respondent, in table order
    pub profiles: Vec<Profile>,
    /// Respondents whose summarization call failed
    pub failed: Vec<String>,
}

/// True when the cell carries nothing but identifiers and separators
fn is_pseudonymized(cell: &str) -> bool {
    cell.split(',')
        .map(str::trim)
        .all(|token| token.is_empty() || is_identifier(token))
}

/// `(field, answer)` pairs worth summarizing for one row
///
/// Skips `user_id`, blank answers and answers already replaced by
/// identifiers, so nothing opaque is sent to the service.
pub fn profile_fields(record: &[(&str, &str)]) -> Vec<(String, String)> {
    record
        .iter()
        .filter(|(field, _)| *field != USER_ID_COLUMN)
        .filter_map(|(field, value)| {
            let trimmed = value.trim();
            if trimmed.is_empty() || is_pseudonymized(trimmed) {
                None
            } else {
                Some((field.to_string(), trimmed.to_string()))
            }
        })
        .collect()
}

/// Summarize every respondent in `table`
///
/// **Algorithm:**
/// 1. Skip rows with an empty `user_id` and repeats of an earlier `user_id`
/// 2. Collect the row's summarizable fields; none → empty summary, no call
/// 3. Call the summarizer; on error record [`SUMMARY_FAILED`]
pub async fn summarize_respondents(
    table: &RespondentTable,
    summarizer: &dyn ProfileSummarizer,
) -> Result<SummaryReport> {
    table.require_column(USER_ID_COLUMN)?;

    let mut report = SummaryReport::default();
    let mut seen = HashSet::new();

    for row in 0..table.len() {
        let record = table.record(row);
        let user_id = record
            .iter()
            .find(|(field, _)| *field == USER_ID_COLUMN)
            .map(|(_, value)| value.trim())
            .unwrap_or_default();
        if user_id.is_empty() || !seen.insert(user_id.to_string()) {
            continue;
        }

        let fields = profile_fields(&record);
        if fields.is_empty() {
            tracing::debug!(user_id = %user_id, "No readable answers; empty summary");
            report.profiles.push(Profile::new(user_id, ""));
            continue;
        }

        let text = match summarizer.summarize(&fields).await {
            Ok(summary) => summary.trim().to_string(),
            Err(e) => {
                tracing::error!(user_id = %user_id, error = %e, "Summarization failed");
                report.failed.push(user_id.to_string());
                SUMMARY_FAILED.to_string()
            }
        };
        report.profiles.push(Profile::new(user_id, text));
    }

    tracing::info!(
        respondents = report.profiles.len(),
        failed = report.failed.len(),
        "Summarized respondents"
    );

    Ok(report)
}
