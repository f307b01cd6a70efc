use scrape_logging::{scrape_debug, scrape_info};

use crate::coerce::{coerce_cell, CoercionContext, CoercionOptions};
use crate::payload::RawPayload;
use crate::schema::{resolve_columns, ColumnDescriptor};
use crate::value::CellValue;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("row {row} has {found} cells but the table has {expected} columns")]
pub struct ShapeError {
    pub row: usize,
    pub expected: usize,
    pub found: usize,
}

/// One record; `cells[i]` belongs to `columns[i]` of the owning table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    pub record_id: Option<String>,
    pub created_time: Option<String>,
    cells: Vec<CellValue>,
}

impl Row {
    pub fn new(cells: Vec<CellValue>) -> Self {
        Self {
            record_id: None,
            created_time: None,
            cells,
        }
    }

    pub fn with_record_id(mut self, record_id: impl Into<String>) -> Self {
        self.record_id = Some(record_id.into());
        self
    }

    pub fn cells(&self) -> &[CellValue] {
        &self.cells
    }
}

/// Point-in-time snapshot of a view: ordered columns and ordered rows.
///
/// Every row carries exactly one cell per column. Duplicate display names are
/// kept as declared; [`Table::column_keys`] gives unique keys for mapping exports.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<ColumnDescriptor>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(columns: Vec<ColumnDescriptor>, rows: Vec<Row>) -> Result<Self, ShapeError> {
        if let Some((row, found)) = rows
            .iter()
            .enumerate()
            .map(|(i, r)| (i, r.cells.len()))
            .find(|(_, len)| *len != columns.len())
        {
            return Err(ShapeError {
                row,
                expected: columns.len(),
                found,
            });
        }
        let columns = columns
            .into_iter()
            .enumerate()
            .map(|(ordinal, column)| ColumnDescriptor { ordinal, ..column })
            .collect();
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Position of the first column called `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Cell of row `row` in the first column called `name`.
    pub fn value(&self, row: usize, name: &str) -> Option<&CellValue> {
        let column = self.column_index(name)?;
        self.rows.get(row).and_then(|r| r.cells.get(column))
    }

    /// Unique keys in column order: repeated names get ` (2)`, ` (3)`, ...
    pub fn column_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let mut key = column.name.clone();
            let mut n = 1;
            while keys.contains(&key) {
                n += 1;
                key = format!("{} ({n})", column.name);
            }
            keys.push(key);
        }
        keys
    }
}

/// Build the table from a payload: columns in declared order, rows in stored
/// order, absent cells resolved through the empty-marker rules.
pub fn assemble(payload: &RawPayload, options: &CoercionOptions) -> Table {
    let columns = resolve_columns(payload.raw_columns());
    let ctx = CoercionContext {
        options,
        users: payload.users(),
    };

    let rows: Vec<Row> = payload
        .raw_rows()
        .iter()
        .map(|raw| {
            let stray = raw
                .cell_values_by_column_id
                .keys()
                .filter(|id| !columns.iter().any(|c| &c.id == *id))
                .count();
            if stray > 0 {
                scrape_debug!("row {:?}: ignoring {} cells of undeclared columns", raw.id, stray);
            }
            let cells = columns
                .iter()
                .map(|column| coerce_cell(column, raw.cell_values_by_column_id.get(&column.id), &ctx))
                .collect();
            Row {
                record_id: Some(raw.id.clone()).filter(|id| !id.is_empty()),
                created_time: raw.created_time.clone(),
                cells,
            }
        })
        .collect();

    scrape_info!("assembled table with {} columns and {} rows", columns.len(), rows.len());
    Table { columns, rows }
}
