//! CSV upload parsing and header resolution.

use crate::error::ParseError;
use crate::types::{ColumnMap, InvoiceRow, InvoiceTable, LogicalColumn, ResolvedColumn};
use std::collections::HashSet;

/// Tab if the text contains a tab anywhere, comma otherwise.
pub fn detect_delimiter(raw: &str) -> u8 {
    if raw.contains('\t') {
        b'\t'
    } else {
        b','
    }
}

/// Decode an uploaded file as UTF-8 (a leading BOM is dropped) and parse it.
pub fn ingest_bytes(bytes: &[u8]) -> Result<InvoiceTable, ParseError> {
    let text = std::str::from_utf8(bytes).map_err(|_| ParseError::Encoding)?;
    ingest(text.strip_prefix('\u{feff}').unwrap_or(text))
}

/// Parse delimited text into rows and resolve the logical columns.
///
/// Records shorter than the header row are padded with empty values; longer
/// ones make the file invalid.
pub fn ingest(raw: &str) -> Result<InvoiceTable, ParseError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(detect_delimiter(raw))
        .has_headers(true)
        .flexible(true)
        .from_reader(raw.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(ParseError::Empty);
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.len() > headers.len() {
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            return Err(ParseError::RaggedRow {
                line,
                expected: headers.len(),
                found: record.len(),
            });
        }
        let mut values: Vec<String> = record.iter().map(String::from).collect();
        values.resize(headers.len(), String::new());
        rows.push(InvoiceRow::new(values));
    }

    let columns = resolve_columns(&headers);
    tracing::debug!(
        rows = rows.len(),
        resolved = columns.len(),
        "parsed invoice CSV"
    );
    Ok(InvoiceTable {
        headers,
        rows,
        columns,
    })
}

/// Case-insensitive, whitespace-trimmed exact match of each logical column; first match wins.
pub fn resolve_columns(headers: &[String]) -> ColumnMap {
    let mut map = ColumnMap::default();
    for column in LogicalColumn::ALL {
        let found = headers
            .iter()
            .enumerate()
            .find(|(_, h)| h.trim().to_lowercase() == column.key());
        if let Some((index, header)) = found {
            map.insert(
                column,
                ResolvedColumn {
                    header: header.clone(),
                    index,
                },
            );
        }
    }
    map
}

/// Trim an invoice id and drop an all-zero fractional part (`"12345.0"` -> `"12345"`).
pub fn normalize_invoice_id(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some((whole, fraction)) = trimmed.split_once('.') {
        let numeric_whole = !whole.is_empty() && whole.bytes().all(|b| b.is_ascii_digit());
        let zero_fraction = !fraction.is_empty() && fraction.bytes().all(|b| b == b'0');
        if numeric_whole && zero_fraction {
            return whole.to_string();
        }
    }
    trimmed.to_string()
}

impl InvoiceTable {
    /// Normalized invoice ids in first-seen order, duplicates and blanks removed.
    /// `None` when the invoice id column is unresolved.
    pub fn unique_invoice_ids(&self) -> Option<Vec<String>> {
        let index = self.columns.index(LogicalColumn::InvoiceId)?;
        let mut seen = HashSet::new();
        let mut ids = Vec::new();
        for (line, row) in self.rows.iter().enumerate() {
            let id = normalize_invoice_id(row.get(index).unwrap_or_default());
            if id.is_empty() {
                tracing::warn!(row = line + 1, "skipping row with blank invoice id");
                continue;
            }
            if seen.insert(id.clone()) {
                ids.push(id);
            }
        }
        Some(ids)
    }

    /// First row whose normalized invoice id equals `invoice_id`.
    pub fn find_row(&self, invoice_id: &str) -> Option<&InvoiceRow> {
        let index = self.columns.index(LogicalColumn::InvoiceId)?;
        self.rows
            .iter()
            .find(|row| normalize_invoice_id(row.get(index).unwrap_or_default()) == invoice_id)
    }
}
