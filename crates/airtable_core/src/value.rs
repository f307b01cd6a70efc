use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::ResolvedKind;

/// File attached to a record. Content is never downloaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub url: Option<String>,
    pub size: Option<u64>,
    #[serde(rename = "type")]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collaborator {
    pub name: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// A coerced cell. `Empty` marks "no value present" and is distinct from
/// every falsy value (`Number(0.0)`, `Text("")` never occurs, `Boolean(false)`).
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    /// Multi-select labels or linked-record display values, in stored order.
    List(Vec<String>),
    Attachments(Vec<Attachment>),
    Collaborators(Vec<Collaborator>),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CellValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Display strings of a multi-valued cell (labels, record names, file names, user names).
    pub fn display_values(&self) -> Vec<String> {
        match self {
            CellValue::List(items) => items.clone(),
            CellValue::Attachments(files) => files.iter().map(|a| a.name.clone()).collect(),
            CellValue::Collaborators(users) => users.iter().map(|u| u.name.clone()).collect(),
            _ => Vec::new(),
        }
    }

    /// Native JSON shape: lists stay lists, dates are ISO strings, empty is `null`.
    pub fn to_json(&self) -> Value {
        match self {
            CellValue::Empty => Value::Null,
            CellValue::Text(text) => Value::String(text.clone()),
            CellValue::Number(n) => number_to_json(*n),
            CellValue::Boolean(b) => Value::Bool(*b),
            CellValue::Date(date) => Value::String(format_date(date)),
            CellValue::DateTime(instant) => Value::String(format_date_time(instant)),
            CellValue::List(items) => {
                Value::Array(items.iter().cloned().map(Value::String).collect())
            }
            CellValue::Attachments(files) => serde_json::to_value(files).unwrap_or(Value::Null),
            CellValue::Collaborators(users) => serde_json::to_value(users).unwrap_or(Value::Null),
        }
    }

    /// Inverse of [`CellValue::to_json`] for a column of `kind`.
    /// Values that do not fit the kind read back as `None`.
    pub fn from_json(kind: &ResolvedKind, value: &Value) -> Option<CellValue> {
        if value.is_null() {
            return Some(CellValue::Empty);
        }
        let cell = match kind.value_kind() {
            ResolvedKind::Text | ResolvedKind::SingleSelect => CellValue::Text(value.as_str()?.to_string()),
            ResolvedKind::Number => CellValue::Number(value.as_f64()?),
            ResolvedKind::Boolean => CellValue::Boolean(value.as_bool()?),
            ResolvedKind::Date => CellValue::Date(NaiveDate::parse_from_str(value.as_str()?, DATE_FORMAT).ok()?),
            ResolvedKind::DateTime => CellValue::DateTime(
                DateTime::parse_from_rfc3339(value.as_str()?)
                    .ok()?
                    .with_timezone(&Utc),
            ),
            ResolvedKind::MultiSelect | ResolvedKind::Reference => CellValue::List(
                value
                    .as_array()?
                    .iter()
                    .map(|item| item.as_str().map(str::to_string))
                    .collect::<Option<Vec<_>>>()?,
            ),
            ResolvedKind::Attachment => CellValue::Attachments(Vec::deserialize(value).ok()?),
            ResolvedKind::Collaborator => CellValue::Collaborators(Vec::deserialize(value).ok()?),
            ResolvedKind::Computed(_) => return None,
        };
        Some(cell)
    }
}

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

pub(crate) fn format_date(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub(crate) fn format_date_time(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Integral values are emitted as JSON integers so `3` does not become `3.0`.
fn number_to_json(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integral_numbers_serialize_without_fraction() {
        assert_eq!(CellValue::Number(3.0).to_json(), json!(3));
        assert_eq!(CellValue::Number(0.25).to_json(), json!(0.25));
    }

    #[test]
    fn empty_reads_back_from_null_for_any_kind() {
        assert_eq!(
            CellValue::from_json(&ResolvedKind::Boolean, &Value::Null),
            Some(CellValue::Empty)
        );
    }
}
