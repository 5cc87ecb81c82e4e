//! Whole-cell vaulting of an open-ended column
//!
//! Each non-blank answer is swapped for a manual identifier; the verbatim
//! text is kept only in the returned map. Unlike list translation, the cell
//! is not split or normalized: it reverses to exactly what was written.

use famsort_common::identifier::Identifier;
use famsort_common::{ManualMap, RespondentTable, Result};

/// Output of [`vault`]
#[derive(Debug, Clone)]
pub struct VaultResult {
    pub table: RespondentTable,
    /// Mapping for this column only; merge it into the run's manual map
    pub manual_map: ManualMap,
    /// False when the column was absent and nothing happened
    pub applied: bool,
}

/// Replace every non-blank cell of `column` with a manual identifier
///
/// Verbatim repeats of the same text share one identifier. Blank cells
/// become empty strings. Cells already holding a single identifier are left
/// as they are. A missing column is a warning, not an error.
pub fn vault(table: &RespondentTable, column: &str) -> Result<VaultResult> {
    let mut manual_map = ManualMap::new();

    if !table.has_column(column) {
        tracing::warn!(column = %column, "Column not found for free-text vaulting");
        return Ok(VaultResult {
            table: table.clone(),
            manual_map,
            applied: false,
        });
    }

    let table = table.map_column(column, |cell| {
        if cell.trim().is_empty() {
            String::new()
        } else if let Some(id) = Identifier::parse(cell) {
            id.into_string()
        } else {
            manual_map.get_or_mint(cell).into_string()
        }
    })?;

    tracing::info!(column = %column, vaulted = manual_map.len(), "Vaulted free-text column");

    Ok(VaultResult {
        table,
        manual_map,
        applied: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use famsort_common::identifier::is_manual_identifier;

    fn table(cells: &[&str]) -> RespondentTable {
        RespondentTable::from_rows(
            ["user_id", "anything_else"],
            cells
                .iter()
                .map(|c| vec!["u".to_string(), c.to_string()])
                .collect(),
        )
    }

    #[test]
    fn test_cells_replaced_and_reversible() {
        let out = vault(&table(&["I snore, sorry!", "", "Vegetarian"]), "anything_else").unwrap();
        let first = out.table.cell(0, "anything_else").unwrap();
        assert!(is_manual_identifier(first));
        assert_eq!(out.manual_map.get_text(first), Some("I snore, sorry!"));
        assert_eq!(out.table.cell(1, "anything_else"), Some(""));
        assert_eq!(out.manual_map.len(), 2);
        assert!(out.applied);
    }

    #[test]
    fn test_verbatim_repeat_reuses_identifier() {
        let out = vault(&table(&["n/a", "n/a", "N/A"]), "anything_else").unwrap();
        let values = out.table.column_values("anything_else").unwrap();
        assert_eq!(values[0], values[1]);
        assert_ne!(values[0], values[2]);
    }

    #[test]
    fn test_whitespace_only_cells_blank() {
        let out = vault(&table(&["  \n "]), "anything_else").unwrap();
        assert_eq!(out.table.cell(0, "anything_else"), Some(""));
        assert!(out.manual_map.is_empty());
    }

    #[test]
    fn test_second_pass_is_noop() {
        let first = vault(&table(&["hello"]), "anything_else").unwrap();
        let second = vault(&first.table, "anything_else").unwrap();
        assert_eq!(second.table, first.table);
        assert!(second.manual_map.is_empty());
    }

    #[test]
    fn test_missing_column() {
        let input = table(&["x"]);
        let out = vault(&input, "nope").unwrap();
        assert!(!out.applied);
        assert_eq!(out.table, input);
    }
}
