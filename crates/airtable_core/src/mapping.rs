use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};

use crate::schema::ColumnDescriptor;
use crate::table::{Row, ShapeError, Table};
use crate::value::CellValue;

const INDEX_KEY_PREFIX: &str = "row";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MappingError {
    #[error("expected {expected} at the top level of a {orientation} mapping")]
    WrongShape {
        orientation: Orientation,
        expected: &'static str,
    },
    #[error("record {row} is not an object")]
    NotAnObject { row: usize },
    #[error("record {row} has key {key:?} which is not a column")]
    UnknownKey { row: usize, key: String },
    #[error("record {row}: value for {column:?} does not fit a {kind} column")]
    InvalidValue {
        row: usize,
        column: String,
        kind: String,
    },
    #[error("index key {0:?} is not of the form row<N>")]
    BadIndexKey(String),
    #[error(transparent)]
    Shape(#[from] ShapeError),
}

/// Orientation of the nested-mapping export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    /// `[ {column: value}, ... ]`, one object per row.
    #[default]
    Records,
    /// `{ "row1": {column: value}, ... }`, 1-based row keys.
    Index,
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Orientation::Records => f.write_str("records"),
            Orientation::Index => f.write_str("index"),
        }
    }
}

impl FromStr for Orientation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "records" => Ok(Orientation::Records),
            "index" => Ok(Orientation::Index),
            other => Err(format!("unknown orientation {other:?}; use records or index")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JsonOptions {
    pub pretty: bool,
}

/// Nested mapping of the table; keys are [`Table::column_keys`].
pub fn to_mapping(table: &Table, orientation: Orientation) -> Value {
    let keys = table.column_keys();
    let records = table.rows().iter().map(|row| row_object(&keys, row));
    match orientation {
        Orientation::Records => Value::Array(records.map(Value::Object).collect()),
        Orientation::Index => Value::Object(
            records
                .enumerate()
                .map(|(i, record)| (format!("{INDEX_KEY_PREFIX}{}", i + 1), Value::Object(record)))
                .collect(),
        ),
    }
}

/// Structured-text export: array of row objects with native value shapes.
pub fn to_json_string(table: &Table, options: &JsonOptions) -> String {
    let value = to_mapping(table, Orientation::Records);
    if options.pretty {
        serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
    } else {
        value.to_string()
    }
}

fn row_object(keys: &[String], row: &Row) -> Map<String, Value> {
    keys.iter()
        .cloned()
        .zip(row.cells().iter().map(CellValue::to_json))
        .collect()
}

/// Rebuild a table from a mapping produced by [`to_mapping`] with the same columns.
pub fn from_mapping(
    columns: Vec<ColumnDescriptor>,
    value: &Value,
    orientation: Orientation,
) -> Result<Table, MappingError> {
    let records: Vec<&Value> = match (orientation, value) {
        (Orientation::Records, Value::Array(items)) => items.iter().collect(),
        (Orientation::Index, Value::Object(map)) => {
            let mut keyed = map
                .iter()
                .map(|(key, record)| Ok((index_of(key)?, record)))
                .collect::<Result<Vec<_>, MappingError>>()?;
            keyed.sort_by_key(|(n, _)| *n);
            keyed.into_iter().map(|(_, record)| record).collect()
        }
        (Orientation::Records, _) => {
            return Err(MappingError::WrongShape {
                orientation,
                expected: "an array",
            })
        }
        (Orientation::Index, _) => {
            return Err(MappingError::WrongShape {
                orientation,
                expected: "an object",
            })
        }
    };

    let skeleton = Table::new(columns, Vec::new())?;
    let keys = skeleton.column_keys();
    let rows = records
        .into_iter()
        .enumerate()
        .map(|(row, record)| read_record(skeleton.columns(), &keys, row, record))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Table::new(skeleton.columns().to_vec(), rows)?)
}

fn index_of(key: &str) -> Result<usize, MappingError> {
    key.strip_prefix(INDEX_KEY_PREFIX)
        .and_then(|n| n.parse::<usize>().ok())
        .ok_or_else(|| MappingError::BadIndexKey(key.to_string()))
}

fn read_record(
    columns: &[ColumnDescriptor],
    keys: &[String],
    row: usize,
    record: &Value,
) -> Result<Row, MappingError> {
    let object = record.as_object().ok_or(MappingError::NotAnObject { row })?;
    if let Some(key) = object.keys().find(|key| !keys.contains(key)) {
        return Err(MappingError::UnknownKey {
            row,
            key: key.clone(),
        });
    }
    let cells = columns
        .iter()
        .zip(keys)
        .map(|(column, key)| {
            let raw = object.get(key).unwrap_or(&Value::Null);
            CellValue::from_json(&column.kind, raw).ok_or_else(|| MappingError::InvalidValue {
                row,
                column: key.clone(),
                kind: column.kind.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Row::new(cells))
}

impl Table {
    /// Inverse of [`to_mapping`] with [`Orientation::Records`].
    pub fn from_records(columns: Vec<ColumnDescriptor>, value: &Value) -> Result<Table, MappingError> {
        from_mapping(columns, value, Orientation::Records)
    }

    /// Inverse of [`to_mapping`] with [`Orientation::Index`].
    pub fn from_mapping(columns: Vec<ColumnDescriptor>, value: &Value) -> Result<Table, MappingError> {
        from_mapping(columns, value, Orientation::Index)
    }
}
