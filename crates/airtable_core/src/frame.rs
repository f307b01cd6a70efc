use chrono::{DateTime, NaiveDate, Utc};

use crate::schema::ResolvedKind;
use crate::table::Table;
use crate::value::CellValue;

/// Storage of one frame column. `None` is a missing value.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Text(Vec<Option<String>>),
    Number(Vec<Option<f64>>),
    Boolean(Vec<Option<bool>>),
    Date(Vec<Option<NaiveDate>>),
    DateTime(Vec<Option<DateTime<Utc>>>),
    /// Multi-valued and reference kinds keep the whole cell.
    Object(Vec<CellValue>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Text(v) => v.len(),
            ColumnData::Number(v) => v.len(),
            ColumnData::Boolean(v) => v.len(),
            ColumnData::Date(v) => v.len(),
            ColumnData::DateTime(v) => v.len(),
            ColumnData::Object(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub const fn dtype(&self) -> &'static str {
        match self {
            ColumnData::Text(_) => "str",
            ColumnData::Number(_) => "f64",
            ColumnData::Boolean(_) => "bool",
            ColumnData::Date(_) => "date",
            ColumnData::DateTime(_) => "datetime",
            ColumnData::Object(_) => "object",
        }
    }

    /// Number of missing values.
    pub fn null_count(&self) -> usize {
        match self {
            ColumnData::Text(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnData::Number(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnData::Boolean(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnData::Date(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnData::DateTime(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnData::Object(v) => v.iter().filter(|x| x.is_empty()).count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameColumn {
    pub name: String,
    pub kind: ResolvedKind,
    pub data: ColumnData,
}

/// Columnar, in-memory view of a [`Table`], one typed column per descriptor.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    columns: Vec<FrameColumn>,
    height: usize,
}

impl Frame {
    pub fn from_table(table: &Table) -> Self {
        let columns = table
            .columns()
            .iter()
            .enumerate()
            .map(|(index, descriptor)| {
                let cells = table.rows().iter().map(|row| &row.cells()[index]);
                FrameColumn {
                    name: descriptor.name.clone(),
                    kind: descriptor.kind.clone(),
                    data: collect_column(descriptor.kind.value_kind(), cells),
                }
            })
            .collect();
        Self {
            columns,
            height: table.len(),
        }
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[FrameColumn] {
        &self.columns
    }

    /// First column called `name`.
    pub fn column(&self, name: &str) -> Option<&FrameColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn dtypes(&self) -> Vec<(&str, &'static str)> {
        self.columns
            .iter()
            .map(|c| (c.name.as_str(), c.data.dtype()))
            .collect()
    }
}

fn collect_column<'a>(kind: &ResolvedKind, cells: impl Iterator<Item = &'a CellValue>) -> ColumnData {
    match kind {
        ResolvedKind::Text | ResolvedKind::SingleSelect => {
            ColumnData::Text(cells.map(|c| c.as_text().map(str::to_string)).collect())
        }
        ResolvedKind::Number => ColumnData::Number(cells.map(CellValue::as_number).collect()),
        ResolvedKind::Boolean => ColumnData::Boolean(cells.map(CellValue::as_bool).collect()),
        ResolvedKind::Date => ColumnData::Date(
            cells
                .map(|c| match c {
                    CellValue::Date(date) => Some(*date),
                    _ => None,
                })
                .collect(),
        ),
        ResolvedKind::DateTime => ColumnData::DateTime(
            cells
                .map(|c| match c {
                    CellValue::DateTime(instant) => Some(*instant),
                    _ => None,
                })
                .collect(),
        ),
        _ => ColumnData::Object(cells.cloned().collect()),
    }
}
