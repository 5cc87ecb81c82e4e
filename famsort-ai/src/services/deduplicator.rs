//! Duplicate submission removal
//!
//! Respondents may submit the form more than once; only the latest
//! submission per respondent survives.

use chrono::NaiveDateTime;
use famsort_common::{normalize_name, RespondentTable, Result};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Timestamp layouts tried in order (form exports, ISO, spreadsheet dates)
const TIMESTAMP_FORMATS: &[&str] = &[
    "%m/%d/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%m/%d/%Y", "%Y-%m-%d"];

/// Sort key for one submission timestamp
///
/// Parsed timestamps order chronologically and come before any value that
/// failed to parse. Unparsable values order by their raw text, so a sheet
/// with odd timestamps still dedups deterministically, just not
/// necessarily chronologically.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SubmissionTime {
    Parsed(NaiveDateTime),
    Raw(String),
}

impl Ord for SubmissionTime {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SubmissionTime::Parsed(a), SubmissionTime::Parsed(b)) => a.cmp(b),
            (SubmissionTime::Parsed(_), SubmissionTime::Raw(_)) => Ordering::Less,
            (SubmissionTime::Raw(_), SubmissionTime::Parsed(_)) => Ordering::Greater,
            (SubmissionTime::Raw(a), SubmissionTime::Raw(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for SubmissionTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn parse_submission_time(raw: &str) -> SubmissionTime {
    let trimmed = raw.trim();
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(trimmed) {
        return SubmissionTime::Parsed(dt.naive_utc());
    }
    for format in TIMESTAMP_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return SubmissionTime::Parsed(dt);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = chrono::NaiveDate::parse_from_str(trimmed, format) {
            if let Some(dt) = date.and_hms_opt(0, 0, 0) {
                return SubmissionTime::Parsed(dt);
            }
        }
    }
    SubmissionTime::Raw(raw.to_string())
}

/// Keep the most recent submission per respondent
///
/// **Algorithm:**
/// 1. Fail with `MissingColumn` if either column is absent
/// 2. Stable-sort rows by submission time, ascending
/// 3. Walk the sorted rows; a later row for the same normalized identity
///    replaces the earlier one
/// 4. Emit survivors in sorted order of their (latest) submission
///
/// Rows with a blank identity are not respondents and are never merged
/// with one another.
pub fn dedupe(
    table: &RespondentTable,
    timestamp_column: &str,
    identity_column: &str,
) -> Result<RespondentTable> {
    let ts_values = table.column_values(timestamp_column)?;
    let identities = table.column_values(identity_column)?;

    let times: Vec<SubmissionTime> = ts_values.iter().map(|v| parse_submission_time(v)).collect();
    let unparsed = times
        .iter()
        .filter(|t| matches!(t, SubmissionTime::Raw(_)))
        .count();
    if unparsed > 0 {
        tracing::warn!(
            unparsed,
            column = timestamp_column,
            "Timestamps not recognized; ordering those rows by raw text"
        );
    }

    let mut order: Vec<usize> = (0..table.len()).collect();
    order.sort_by(|&a, &b| times[a].cmp(&times[b]));

    let mut latest: HashMap<String, usize> = HashMap::new();
    let mut keep = vec![false; table.len()];
    for &row in &order {
        let key = normalize_name(identities[row]);
        if key.is_empty() {
            keep[row] = true;
            continue;
        }
        if let Some(previous) = latest.insert(key, row) {
            keep[previous] = false;
        }
        keep[row] = true;
    }

    let survivors: Vec<usize> = order.into_iter().filter(|&row| keep[row]).collect();

    tracing::info!(
        input_rows = table.len(),
        output_rows = survivors.len(),
        "Deduplicated submissions"
    );

    Ok(table.select_rows(&survivors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use famsort_common::Error;

    fn table(rows: &[(&str, &str, &str)]) -> RespondentTable {
        RespondentTable::from_rows(
            ["Timestamp", "First and Last Name", "Answer"],
            rows.iter()
                .map(|(t, n, a)| vec![t.to_string(), n.to_string(), a.to_string()])
                .collect(),
        )
    }

    #[test]
    fn test_later_submission_wins() {
        let input = table(&[
            ("3/2/2025 10:00:00", "Jane Doe", "second"),
            ("3/1/2025 09:00:00", "Jane Doe", "first"),
        ]);
        let out = dedupe(&input, "Timestamp", "First and Last Name").unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out.cell(0, "Answer"), Some("second"));
    }

    #[test]
    fn test_chronological_not_lexicographic() {
        // "10/..." sorts before "9/..." as text
        let input = table(&[
            ("10/1/2025 08:00:00", "Sam Lee", "october"),
            ("9/30/2025 08:00:00", "Sam Lee", "september"),
        ]);
        let out = dedupe(&input, "Timestamp", "First and Last Name").unwrap();
        assert_eq!(out.cell(0, "Answer"), Some("october"));
    }

    #[test]
    fn test_identity_matched_after_normalization() {
        let input = table(&[
            ("2025-01-01 00:00:00", "Jane Doe", "a"),
            ("2025-01-02 00:00:00", " jane  doe ", "b"),
        ]);
        let out = dedupe(&input, "Timestamp", "First and Last Name").unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out.cell(0, "Answer"), Some("b"));
    }

    #[test]
    fn test_distinct_respondents_kept_in_time_order() {
        let input = table(&[
            ("2025-01-03 00:00:00", "Cy", "c"),
            ("2025-01-01 00:00:00", "Al", "a"),
            ("2025-01-02 00:00:00", "Bo", "b"),
        ]);
        let out = dedupe(&input, "Timestamp", "First and Last Name").unwrap();
        assert_eq!(out.column_values("Answer").unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_blank_identities_are_not_merged() {
        let input = table(&[
            ("2025-01-01 00:00:00", "", "x"),
            ("2025-01-02 00:00:00", "  ", "y"),
        ]);
        let out = dedupe(&input, "Timestamp", "First and Last Name").unwrap();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_unparsable_timestamps_fall_back_to_text() {
        let input = table(&[
            ("b-late", "Al", "second"),
            ("a-early", "Al", "first"),
            ("2025-01-01 00:00:00", "Bo", "parsed"),
        ]);
        let out = dedupe(&input, "Timestamp", "First and Last Name").unwrap();
        assert_eq!(out.column_values("Answer").unwrap(), vec!["parsed", "second"]);
    }

    #[test]
    fn test_missing_timestamp_column() {
        let input = RespondentTable::from_rows(["First and Last Name"], vec![]);
        let err = dedupe(&input, "Timestamp", "First and Last Name").unwrap_err();
        assert!(matches!(err, Error::MissingColumn { ref column } if column == "Timestamp"));
    }

    #[test]
    fn test_deterministic_for_identical_input() {
        let input = table(&[
            ("same", "Al", "1"),
            ("same", "Bo", "2"),
            ("same", "Al", "3"),
        ]);
        let a = dedupe(&input, "Timestamp", "First and Last Name").unwrap();
        let b = dedupe(&input, "Timestamp", "First and Last Name").unwrap();
        assert_eq!(a, b);
        // Stable sort: row 3 is the later "Al"
        assert_eq!(a.column_values("Answer").unwrap(), vec!["2", "3"]);
    }
}
