//! Spreadsheet input and CSV output
//!
//! Input format is chosen by extension:
//! - `.csv` → `csv` reader (flexible row widths)
//! - `.xlsx`, `.xls`, `.xlsm`, `.xlsb` → first worksheet via `calamine`
//!
//! Rows whose cells are all blank are skipped. Cell text is kept as
//! written; only headers are normalized.

use calamine::{open_workbook_auto, DataType, Reader};
use famsort_common::{Error, RespondentTable, Result};
use std::path::Path;

const EXCEL_EXTENSIONS: &[&str] = &["xlsx", "xls", "xlsm", "xlsb"];

/// Read a respondent table from `path`
pub fn read_table(path: &Path) -> Result<RespondentTable> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let table = if extension == "csv" {
        read_csv(path, true)?
    } else if EXCEL_EXTENSIONS.contains(&extension.as_str()) {
        read_workbook(path)?
    } else {
        return Err(Error::UnsupportedFormat(if extension.is_empty() {
            path.display().to_string()
        } else {
            format!(".{}", extension)
        }));
    };

    tracing::info!(
        rows = table.len(),
        columns = table.columns().len(),
        "Loaded spreadsheet"
    );
    Ok(table)
}

/// Read a CSV written by [`write_table_csv`], keeping blank rows
///
/// Used for intermediates, where dropping a row would lose a respondent.
pub fn read_csv_all_rows(path: &Path) -> Result<RespondentTable> {
    read_csv(path, false)
}

fn read_csv(path: &Path, skip_blank_rows: bool) -> Result<RespondentTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut table = RespondentTable::new(headers);

    for record in reader.records() {
        let values: Vec<String> = record?.iter().map(str::to_string).collect();
        if skip_blank_rows && values.iter().all(|value| value.trim().is_empty()) {
            continue;
        }
        table.push_row(values);
    }

    Ok(table)
}

fn read_workbook(path: &Path) -> Result<RespondentTable> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| Error::Spreadsheet(format!("Unable to open workbook: {}", e)))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| Error::Spreadsheet("Workbook contains no worksheets".to_string()))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .ok_or_else(|| Error::Spreadsheet(format!("Unable to read worksheet '{}'", sheet_name)))?
        .map_err(|e| Error::Spreadsheet(format!("Unable to read worksheet data: {}", e)))?;

    let mut rows_iter = range.rows();
    let header_row = rows_iter
        .next()
        .ok_or_else(|| Error::Spreadsheet(format!("Worksheet '{}' is empty", sheet_name)))?;

    let mut table = RespondentTable::new(header_row.iter().map(cell_to_string));

    for row in rows_iter {
        let values: Vec<String> = row.iter().map(cell_to_string).collect();
        if values.iter().all(|value| value.trim().is_empty()) {
            continue;
        }
        table.push_row(values);
    }

    Ok(table)
}

fn cell_to_string(cell: &DataType) -> String {
    match cell {
        DataType::Empty => String::new(),
        _ => cell.to_string(),
    }
}

/// Write `table` as CSV, creating parent directories as needed
///
/// Rows go to a temp file beside `path` that is renamed over it once
/// complete, so an existing file is never left half-written.
pub fn write_table_csv(table: &RespondentTable, path: &Path) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut staged = tempfile::NamedTempFile::new_in(parent)?;
    {
        let mut writer = csv::Writer::from_writer(staged.as_file_mut());
        writer.write_record(table.columns())?;
        for row in table.rows() {
            writer.write_record(row)?;
        }
        writer.flush()?;
    }
    staged.persist(path).map_err(|e| Error::Io(e.error))?;

    tracing::debug!(path = %path.display(), rows = table.len(), "Wrote CSV");
    Ok(())
}
