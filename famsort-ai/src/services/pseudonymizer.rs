//! Identity column replacement
//!
//! Swaps the respondent name column for an opaque `user_id` and drops every
//! column the PII redactor flags.

use super::pii_redactor::PiiRedactor;
use famsort_common::config::USER_ID_COLUMN;
use famsort_common::{normalize_name, NameMap, RespondentTable, Result};

/// Output of [`Pseudonymizer::pseudonymize`]
#[derive(Debug, Clone)]
pub struct Pseudonymized {
    /// Table with a leading `user_id` column and no PII columns
    pub table: RespondentTable,
    /// Normalized name ↔ identifier for every non-blank respondent
    pub name_map: NameMap,
    /// Columns dropped by the redactor (the identity column is not listed)
    pub suppressed_columns: Vec<String>,
}

/// Replaces the identity column and scrubs PII columns
#[derive(Debug, Clone)]
pub struct Pseudonymizer {
    redactor: PiiRedactor,
}

impl Pseudonymizer {
    pub fn new(redactor: PiiRedactor) -> Self {
        Self { redactor }
    }

    /// Pseudonymize `table` on `identity_column`
    ///
    /// **Algorithm:**
    /// 1. Normalize every identity value (trim, lowercase, `_` between words)
    /// 2. Mint one identifier per distinct non-blank normalized name
    /// 3. Insert `user_id` as the first column; blank names get `""`
    /// 4. Remove the identity column itself
    /// 5. Classify the remaining headers and drop Suppressed columns
    pub fn pseudonymize(
        &self,
        table: &RespondentTable,
        identity_column: &str,
    ) -> Result<Pseudonymized> {
        let identities = table.column_values(identity_column)?;

        let mut name_map = NameMap::new();
        let user_ids: Vec<String> = identities
            .iter()
            .map(|raw| {
                let normalized = normalize_name(raw);
                if normalized.is_empty() {
                    String::new()
                } else {
                    name_map.get_or_mint(&normalized).into_string()
                }
            })
            .collect();

        let blank = user_ids.iter().filter(|id| id.is_empty()).count();
        if blank > 0 {
            tracing::warn!(rows = blank, "Rows without a respondent name get an empty user_id");
        }

        let with_ids = table
            .with_leading_column(USER_ID_COLUMN, user_ids)?
            .without_columns(&[identity_column.to_string()]);

        let candidates: Vec<String> = with_ids
            .columns()
            .iter()
            .filter(|c| c.as_str() != USER_ID_COLUMN)
            .cloned()
            .collect();
        let suppressed_columns = self.redactor.suppressed_columns(&candidates);
        let table = with_ids.without_columns(&suppressed_columns);

        tracing::info!(
            respondents = name_map.len(),
            suppressed = suppressed_columns.len(),
            retained = table.columns().len(),
            "Pseudonymized identity column"
        );

        Ok(Pseudonymized {
            table,
            name_map,
            suppressed_columns,
        })
    }
}
