use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde_json::Value;

use crate::payload::RawPayload;
use crate::schema::{resolve_columns, ResolvedKind};

/// JSON shape of a stored raw cell value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum JsonKind {
    String,
    Number,
    Bool,
    Array,
    Object,
}

impl JsonKind {
    /// `None` for null.
    pub fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(_) => Some(JsonKind::String),
            Value::Number(_) => Some(JsonKind::Number),
            Value::Bool(_) => Some(JsonKind::Bool),
            Value::Array(_) => Some(JsonKind::Array),
            Value::Object(_) => Some(JsonKind::Object),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            JsonKind::String => "string",
            JsonKind::Number => "number",
            JsonKind::Bool => "bool",
            JsonKind::Array => "array",
            JsonKind::Object => "object",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSummary {
    pub ordinal: usize,
    pub name: String,
    pub native_type: String,
    pub kind: ResolvedKind,
    /// Raw JSON shapes seen in this column's stored cells.
    pub observed: BTreeSet<JsonKind>,
    /// Rows whose raw record has no value (or null) for this column.
    pub missing: usize,
}

/// Column-by-column description of a payload's schema.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SchemaSummary {
    columns: Vec<ColumnSummary>,
}

impl SchemaSummary {
    pub fn from_payload(payload: &RawPayload) -> Self {
        let columns = resolve_columns(payload.raw_columns())
            .into_iter()
            .map(|descriptor| {
                let mut observed = BTreeSet::new();
                let mut missing = 0;
                for row in payload.raw_rows() {
                    match row.cell_values_by_column_id.get(&descriptor.id).and_then(JsonKind::of) {
                        Some(kind) => {
                            observed.insert(kind);
                        }
                        None => missing += 1,
                    }
                }
                ColumnSummary {
                    ordinal: descriptor.ordinal,
                    name: descriptor.name,
                    native_type: descriptor.native_type,
                    kind: descriptor.kind,
                    observed,
                    missing,
                }
            })
            .collect();
        Self { columns }
    }

    pub fn columns(&self) -> &[ColumnSummary] {
        &self.columns
    }

    /// Number of columns per resolved kind, keyed by its display form.
    pub fn kind_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for column in &self.columns {
            *counts.entry(column.kind.to_string()).or_insert(0) += 1;
        }
        counts
    }
}

const HEADINGS: [&str; 5] = ["#", "Column", "Airtable Column Type", "Resolved Kind", "Observed"];

impl fmt::Display for SchemaSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total {} columns:", self.columns.len())?;

        let cells: Vec<[String; 5]> = self
            .columns
            .iter()
            .map(|c| {
                let observed: Vec<&str> = c.observed.iter().map(|k| k.as_str()).collect();
                [
                    c.ordinal.to_string(),
                    c.name.clone(),
                    c.native_type.clone(),
                    c.kind.to_string(),
                    if observed.is_empty() {
                        "-".to_string()
                    } else {
                        observed.join(", ")
                    },
                ]
            })
            .collect();

        let mut widths = HEADINGS.map(|h| h.chars().count());
        for line in &cells {
            for (width, cell) in widths.iter_mut().zip(line) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let headings = HEADINGS.map(str::to_string);
        let rule = widths.map(|w| "-".repeat(w));
        for line in std::iter::once(&headings).chain(std::iter::once(&rule)).chain(&cells) {
            let padded: Vec<String> = line
                .iter()
                .zip(widths)
                .map(|(cell, width)| format!("{cell:<width$}"))
                .collect();
            writeln!(f, " {}", padded.join("  ").trim_end())?;
        }

        let counts: Vec<String> = self
            .kind_counts()
            .into_iter()
            .map(|(kind, n)| format!("{kind}({n})"))
            .collect();
        write!(f, "kinds: {}", counts.join(", "))
    }
}

/// Human-readable schema summary of a payload.
pub fn schema_summary(payload: &RawPayload) -> String {
    SchemaSummary::from_payload(payload).to_string()
}
