//! Respondent table model
//!
//! An ordered list of rows over a fixed header. Cells are plain strings; an
//! absent value is the empty string. Every transforming method returns a new
//! table so a stage can be re-run against the previous stage's output.

use crate::{Error, Result};

/// Normalize a header as read from a spreadsheet
///
/// Trims the name and turns embedded line breaks into spaces, so multi-line
/// form questions compare equal to their configured single-line spelling.
pub fn normalize_header(name: &str) -> String {
    name.trim().replace(['\n', '\r'], " ").trim().to_string()
}

/// Tabular survey responses
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RespondentTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RespondentTable {
    /// Create an empty table with normalized headers
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            columns: columns
                .into_iter()
                .map(|c| normalize_header(c.as_ref()))
                .collect(),
            rows: Vec::new(),
        }
    }

    /// Create a table from headers and rows
    ///
    /// Short rows are padded with empty cells and long rows truncated to the
    /// header width.
    pub fn from_rows<I, S>(columns: I, rows: Vec<Vec<String>>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row);
        }
        table
    }

    /// Append a row, aligning it to the header width
    pub fn push_row(&mut self, mut row: Vec<String>) {
        row.resize(self.columns.len(), String::new());
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Index of a column the caller cannot proceed without
    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| Error::missing_column(name))
    }

    /// Cell value by row index and column name
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| r[idx].as_str())
    }

    /// All values of one column, in row order
    pub fn column_values(&self, name: &str) -> Result<Vec<&str>> {
        let idx = self.require_column(name)?;
        Ok(self.rows.iter().map(|r| r[idx].as_str()).collect())
    }

    /// Header/value pairs of one row
    pub fn record(&self, row: usize) -> Vec<(&str, &str)> {
        match self.rows.get(row) {
            Some(values) => self
                .columns
                .iter()
                .map(String::as_str)
                .zip(values.iter().map(String::as_str))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Copy of this table with the rows reordered/filtered by index
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: indices
                .iter()
                .filter_map(|&i| self.rows.get(i).cloned())
                .collect(),
        }
    }

    /// Copy of this table with a new first column
    ///
    /// An existing column of the same name is removed first.
    pub fn with_leading_column(&self, name: &str, values: Vec<String>) -> Result<Self> {
        self.check_height(name, values.len())?;
        let base = self.without_columns(&[name.to_string()]);
        let mut columns = Vec::with_capacity(base.columns.len() + 1);
        columns.push(name.to_string());
        columns.extend(base.columns);
        let rows = base
            .rows
            .into_iter()
            .zip(values)
            .map(|(row, value)| {
                let mut out = Vec::with_capacity(row.len() + 1);
                out.push(value);
                out.extend(row);
                out
            })
            .collect();
        Ok(Self { columns, rows })
    }

    /// Copy of this table with `name` set to `values`
    ///
    /// Replaces the column in place when present, appends it otherwise.
    pub fn with_column(&self, name: &str, values: Vec<String>) -> Result<Self> {
        self.check_height(name, values.len())?;
        let mut table = self.clone();
        match table.column_index(name) {
            Some(idx) => {
                for (row, value) in table.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => {
                table.columns.push(name.to_string());
                for (row, value) in table.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        Ok(table)
    }

    /// Copy of this table with one column rewritten cell by cell
    pub fn map_column<F>(&self, name: &str, mut f: F) -> Result<Self>
    where
        F: FnMut(&str) -> String,
    {
        let idx = self.require_column(name)?;
        let mut table = self.clone();
        for row in table.rows.iter_mut() {
            row[idx] = f(&row[idx]);
        }
        Ok(table)
    }

    /// Copy of this table without the named columns (absent names ignored)
    pub fn without_columns(&self, names: &[String]) -> Self {
        let keep: Vec<usize> = (0..self.columns.len())
            .filter(|&i| !names.contains(&self.columns[i]))
            .collect();
        Self {
            columns: keep.iter().map(|&i| self.columns[i].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| keep.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        }
    }

    fn check_height(&self, name: &str, len: usize) -> Result<()> {
        if len != self.rows.len() {
            return Err(Error::Internal(format!(
                "Column '{}' has {} values for {} rows",
                name,
                len,
                self.rows.len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RespondentTable {
        RespondentTable::from_rows(
            ["Name", "Color"],
            vec![
                vec!["Ann".to_string(), "red".to_string()],
                vec!["Bob".to_string()],
            ],
        )
    }

    #[test]
    fn test_headers_are_normalized() {
        let table = RespondentTable::new(["  Who do you\nwant?\r ", "Timestamp"]);
        assert_eq!(table.columns(), &["Who do you want?", "Timestamp"]);
    }

    #[test]
    fn test_short_rows_are_padded() {
        let table = sample();
        assert_eq!(table.cell(1, "Color"), Some(""));
    }

    #[test]
    fn test_require_column_reports_name() {
        let err = sample().require_column("Email").unwrap_err();
        assert!(matches!(err, Error::MissingColumn { ref column } if column == "Email"));
    }

    #[test]
    fn test_with_leading_column_does_not_touch_source() {
        let table = sample();
        let out = table
            .with_leading_column("user_id", vec!["a".into(), "b".into()])
            .unwrap();
        assert_eq!(out.columns()[0], "user_id");
        assert_eq!(out.cell(1, "user_id"), Some("b"));
        assert!(!table.has_column("user_id"));
    }

    #[test]
    fn test_with_column_rejects_wrong_height() {
        assert!(sample().with_column("x", vec!["1".into()]).is_err());
    }

    #[test]
    fn test_without_columns() {
        let out = sample().without_columns(&["Name".to_string(), "Nope".to_string()]);
        assert_eq!(out.columns(), &["Color"]);
        assert_eq!(out.rows()[0], vec!["red".to_string()]);
    }

    #[test]
    fn test_map_column_and_record() {
        let out = sample().map_column("Color", |c| c.to_uppercase()).unwrap();
        assert_eq!(out.record(0), vec![("Name", "Ann"), ("Color", "RED")]);
    }
}
