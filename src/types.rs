use std::collections::HashMap;

/// Header of the status column appended to every failure record.
pub const DOWNLOAD_STATUS_COLUMN: &str = "Download Status";

/// Columns the downloader needs, resolved against whatever headers the CSV uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LogicalColumn {
    InvoiceId,
    InvoiceNumber,
    Supplier,
    CreatedDate,
}

impl LogicalColumn {
    pub const ALL: [LogicalColumn; 4] = [
        LogicalColumn::InvoiceId,
        LogicalColumn::InvoiceNumber,
        LogicalColumn::Supplier,
        LogicalColumn::CreatedDate,
    ];

    /// Lowercase name a header must equal (after trimming) to resolve to this column.
    pub fn key(self) -> &'static str {
        match self {
            LogicalColumn::InvoiceId => "invoice id",
            LogicalColumn::InvoiceNumber => "invoice #",
            LogicalColumn::Supplier => "supplier",
            LogicalColumn::CreatedDate => "created date",
        }
    }
}

/// A header the resolver matched: the literal text plus its position in each record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumn {
    pub header: String,
    pub index: usize,
}

/// Logical column -> literal header. Unresolved columns are simply absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    columns: HashMap<LogicalColumn, ResolvedColumn>,
}

impl ColumnMap {
    pub fn insert(&mut self, column: LogicalColumn, resolved: ResolvedColumn) {
        self.columns.insert(column, resolved);
    }

    pub fn contains(&self, column: LogicalColumn) -> bool {
        self.columns.contains_key(&column)
    }

    pub fn header(&self, column: LogicalColumn) -> Option<&str> {
        self.columns.get(&column).map(|c| c.header.as_str())
    }

    pub fn index(&self, column: LogicalColumn) -> Option<usize> {
        self.columns.get(&column).map(|c| c.index)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// One parsed CSV record, values in header order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceRow {
    values: Vec<String>,
}

impl InvoiceRow {
    pub fn new(values: Vec<String>) -> Self {
        Self { values }
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.values.get(index).map(String::as_str)
    }

    /// Value of a logical column, or `None` when the column is unresolved.
    pub fn field(&self, columns: &ColumnMap, column: LogicalColumn) -> Option<&str> {
        columns.index(column).and_then(|i| self.get(i))
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }
}

/// Output of ingestion: the header row, the records and the resolved column map.
#[derive(Debug, Clone)]
pub struct InvoiceTable {
    pub headers: Vec<String>,
    pub rows: Vec<InvoiceRow>,
    pub columns: ColumnMap,
}

impl InvoiceTable {
    /// Original fields of a row paired with their headers, for failure records.
    pub fn row_fields(&self, row: &InvoiceRow) -> Vec<(String, String)> {
        self.headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.clone(), row.get(i).unwrap_or_default().to_string()))
            .collect()
    }
}

/// A scan that made it into the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedScan {
    pub invoice_id: String,
    pub filename: String,
    pub size: usize,
}

/// One invoice that could not be retrieved: the source row plus a status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedDownload {
    pub invoice_id: String,
    pub fields: Vec<(String, String)>,
    /// `Failed (<http status>)` or `Failed (<transport error>)`.
    pub status: String,
    pub response_body: Option<String>,
}

/// Per-invoice result reported to progress observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Downloaded(DownloadedScan),
    Failed(FailedDownload),
}

impl FetchOutcome {
    pub fn invoice_id(&self) -> &str {
        match self {
            FetchOutcome::Downloaded(scan) => &scan.invoice_id,
            FetchOutcome::Failed(failure) => &failure.invoice_id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Downloaded(_))
    }
}

/// One unit of progress: `processed` of `total` unique invoice ids are done.
#[derive(Debug, Clone, Copy)]
pub struct Progress<'a> {
    pub processed: usize,
    pub total: usize,
    pub outcome: &'a FetchOutcome,
}
