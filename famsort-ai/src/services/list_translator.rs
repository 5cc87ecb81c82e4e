//! Name-reference translation in list fields
//!
//! Cells like `"Jane Doe, Sam Lee, my cousin"` become comma-joined
//! identifiers. Known respondents map to their name identifier; anything
//! else is minted a manual identifier, reused for the same text across the
//! whole run.

use famsort_common::identifier::Identifier;
use famsort_common::{normalize_name, ManualMap, NameMap, RespondentTable, Result};

/// Separator written between translated tokens
pub const LIST_DELIMITER: &str = ", ";

/// Output of [`ListFieldTranslator::translate`]
#[derive(Debug, Clone)]
pub struct ListTranslation {
    pub table: RespondentTable,
    /// The caller's manual map, extended with any newly minted identifiers
    pub manual_map: ManualMap,
    /// Target columns absent from the table
    pub skipped_columns: Vec<String>,
}

/// Translator for comma-separated name-reference columns
#[derive(Debug, Clone)]
pub struct ListFieldTranslator {
    target_columns: Vec<String>,
}

impl ListFieldTranslator {
    pub fn new(target_columns: Vec<String>) -> Self {
        Self { target_columns }
    }

    pub fn target_columns(&self) -> &[String] {
        &self.target_columns
    }

    /// Translate every target column
    ///
    /// `manual_map` is taken by value and handed back in the result, so the
    /// accumulated unmatched-text mapping is explicit at every call site.
    pub fn translate(
        &self,
        table: &RespondentTable,
        name_map: &NameMap,
        mut manual_map: ManualMap,
    ) -> Result<ListTranslation> {
        let mut current = table.clone();
        let mut skipped_columns = Vec::new();

        for column in &self.target_columns {
            if !current.has_column(column) {
                tracing::warn!(column = %column, "Column not found for identifier translation");
                skipped_columns.push(column.clone());
                continue;
            }
            let before = manual_map.len();
            current = current.map_column(column, |cell| {
                translate_cell(cell, name_map, &mut manual_map)
            })?;
            tracing::debug!(
                column = %column,
                minted = manual_map.len() - before,
                "Translated list column"
            );
        }

        Ok(ListTranslation {
            table: current,
            manual_map,
            skipped_columns,
        })
    }
}

/// Translate one comma-separated cell
///
/// Tokens that already are identifiers pass through unchanged, so a second
/// pass over translated output changes nothing. Blank cells stay blank.
pub fn translate_cell(cell: &str, name_map: &NameMap, manual_map: &mut ManualMap) -> String {
    if cell.trim().is_empty() {
        return String::new();
    }

    cell.split(',')
        .map(|token| {
            if let Some(id) = Identifier::parse(token) {
                return id.into_string();
            }
            let normalized = normalize_name(token);
            if normalized.is_empty() {
                return String::new();
            }
            match name_map.get_id(&normalized) {
                Some(id) => id.to_string(),
                None => manual_map.get_or_mint(&normalized).into_string(),
            }
        })
        .collect::<Vec<_>>()
        .join(LIST_DELIMITER)
}
