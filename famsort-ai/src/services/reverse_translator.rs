//! Identifier → human-readable reversal
//!
//! Inverse of pseudonymization and list translation. Every identifier
//! either resolves through one of the two maps or is rendered as a visible
//! `[UNKNOWN:<id>]` marker; no row or token is ever dropped.

use famsort_common::config::USER_ID_COLUMN;
use famsort_common::{ManualMap, NameMap, RespondentTable, Result};
use once_cell::sync::Lazy;
use regex_lite::Regex;

use super::list_translator::LIST_DELIMITER;

/// Column holding the restored respondent name
pub const NAME_COLUMN: &str = "name";

static EMBEDDED_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:manual-)?[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
    )
    .expect("identifier pattern")
});

/// How one token resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    Name(String),
    Manual(String),
    Unknown(String),
    Blank,
}

impl Resolved {
    /// Text written to the output table
    pub fn render(&self) -> String {
        match self {
            Resolved::Name(name) => name.clone(),
            Resolved::Manual(text) => format!("[manual:{}]", text),
            Resolved::Unknown(raw) => format!("[UNKNOWN:{}]", raw),
            Resolved::Blank => String::new(),
        }
    }
}

/// Output of [`ReverseTranslator::reverse`]
#[derive(Debug, Clone)]
pub struct Reversed {
    pub table: RespondentTable,
    /// Tokens that matched neither map, first occurrence order
    pub unknown_identifiers: Vec<String>,
}

/// Resolves identifiers against a run's persisted maps
pub struct ReverseTranslator<'a> {
    name_map: &'a NameMap,
    manual_map: &'a ManualMap,
}

impl<'a> ReverseTranslator<'a> {
    pub fn new(name_map: &'a NameMap, manual_map: &'a ManualMap) -> Self {
        Self {
            name_map,
            manual_map,
        }
    }

    /// Resolve a single token
    pub fn resolve(&self, token: &str) -> Resolved {
        let token = token.trim();
        if token.is_empty() {
            return Resolved::Blank;
        }
        if let Some(name) = self.name_map.get_name(token) {
            return Resolved::Name(name.to_string());
        }
        if let Some(text) = self.manual_map.get_text(token) {
            return Resolved::Manual(text.to_string());
        }
        Resolved::Unknown(token.to_string())
    }

    /// Reverse a whole table
    ///
    /// **Algorithm:**
    /// 1. Insert a leading `name` column resolved from `user_id`
    /// 2. In each list column, resolve every comma-separated token
    /// 3. In each note column, resolve identifiers embedded in prose,
    ///    leaving unresolvable ones as written
    ///
    /// List and note columns absent from the table are skipped.
    pub fn reverse(
        &self,
        table: &RespondentTable,
        list_columns: &[String],
        note_columns: &[String],
    ) -> Result<Reversed> {
        let mut unknown = UnknownTracker::default();

        let user_ids = table.column_values(USER_ID_COLUMN)?;
        let names: Vec<String> = user_ids
            .iter()
            .map(|id| unknown.track(self.resolve(id)).render())
            .collect();
        let mut current = table.with_leading_column(NAME_COLUMN, names)?;

        for column in list_columns {
            if !current.has_column(column) {
                tracing::warn!(column = %column, "Column not found for reverse translation");
                continue;
            }
            current = current.map_column(column, |cell| {
                if cell.trim().is_empty() {
                    return String::new();
                }
                cell.split(',')
                    .map(|token| unknown.track(self.resolve(token)).render())
                    .collect::<Vec<_>>()
                    .join(LIST_DELIMITER)
            })?;
        }

        for column in note_columns {
            if !current.has_column(column) {
                continue;
            }
            current = current.map_column(column, |cell| {
                EMBEDDED_ID_RE
                    .replace_all(cell, |caps: &regex_lite::Captures<'_>| {
                        let raw = &caps[0];
                        match unknown.track(self.resolve(raw)) {
                            Resolved::Unknown(_) => raw.to_string(),
                            resolved => resolved.render(),
                        }
                    })
                    .into_owned()
            })?;
        }

        if !unknown.ids.is_empty() {
            tracing::warn!(
                count = unknown.ids.len(),
                "Identifiers not found in either map"
            );
        }

        Ok(Reversed {
            table: current,
            unknown_identifiers: unknown.ids,
        })
    }
}

#[derive(Default)]
struct UnknownTracker {
    ids: Vec<String>,
}

impl UnknownTracker {
    fn track(&mut self, resolved: Resolved) -> Resolved {
        if let Resolved::Unknown(raw) = &resolved {
            if !self.ids.contains(raw) {
                self.ids.push(raw.clone());
            }
        }
        resolved
    }
}
