//! PII column classification
//!
//! Decides from header names alone which columns leave the anonymized table.
//! Keyword matching is approximate: it only sees the header, never the data.

use famsort_common::config::PipelineSettings;
use std::collections::HashSet;

/// Classification of one source column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnClass {
    /// Kept in the anonymized table
    Retained,
    /// Dropped as personally identifying
    Suppressed,
}

/// Header-based PII classifier
#[derive(Debug, Clone)]
pub struct PiiRedactor {
    keywords: Vec<String>,
    preserved: HashSet<String>,
}

/// Reduce a name to lowercase letters/digits/punctuation without separators
///
/// Spaces, hyphens and underscores are all dropped so that `Student ID`,
/// `student-id` and the keyword `student_id` compare equal.
fn compact(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_') && !c.is_whitespace())
        .collect()
}

impl PiiRedactor {
    /// Create redactor from keywords and an allow-list of exact column names
    pub fn new<K, P>(keywords: K, preserved: P) -> Self
    where
        K: IntoIterator,
        K::Item: AsRef<str>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| compact(k.as_ref()))
                .filter(|k| !k.is_empty())
                .collect(),
            preserved: preserved.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_settings(settings: &PipelineSettings) -> Self {
        Self::new(&settings.pii_keywords, settings.effective_preserved_columns())
    }

    /// Classify a single column name
    pub fn classify_column(&self, column: &str) -> ColumnClass {
        if self.preserved.contains(column) {
            return ColumnClass::Retained;
        }
        let normalized = compact(column);
        if self.keywords.iter().any(|k| normalized.contains(k.as_str())) {
            ColumnClass::Suppressed
        } else {
            ColumnClass::Retained
        }
    }

    /// Classify every column, preserving header order
    pub fn classify<'a>(&self, columns: &'a [String]) -> Vec<(&'a str, ColumnClass)> {
        columns
            .iter()
            .map(|c| (c.as_str(), self.classify_column(c)))
            .collect()
    }

    /// Names of the columns to drop
    pub fn suppressed_columns(&self, columns: &[String]) -> Vec<String> {
        self.classify(columns)
            .into_iter()
            .filter(|(_, class)| *class == ColumnClass::Suppressed)
            .map(|(name, _)| name.to_string())
            .collect()
    }
}
