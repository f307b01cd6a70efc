//! Per-kind cell coercion.
//!
//! Every rule is total: a value that does not fit its column degrades to
//! [`CellValue::Empty`] (or a best-effort string for text) and is noted at
//! debug level. One malformed cell never aborts the table.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use scrape_logging::scrape_debug;
use serde_json::{Map, Value};

use crate::payload::UserInfo;
use crate::schema::{ColumnDescriptor, ResolvedKind};
use crate::value::{Attachment, CellValue, Collaborator};

/// How `percent` columns store their values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PercentScale {
    /// `0.5` means 50%; used as-is.
    #[default]
    Fraction,
    /// `50` means 50%; divided by 100.
    WholeNumber,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoercionOptions {
    pub percent_scale: PercentScale,
    /// Separator used when a list has to be collapsed into one text value.
    pub text_joiner: String,
}

impl Default for CoercionOptions {
    fn default() -> Self {
        Self {
            percent_scale: PercentScale::Fraction,
            text_joiner: ",".to_string(),
        }
    }
}

/// Lookup state shared by all cells of one table.
#[derive(Debug, Clone, Copy)]
pub struct CoercionContext<'a> {
    pub options: &'a CoercionOptions,
    pub users: &'a BTreeMap<String, UserInfo>,
}

/// Coerce one stored value (or its absence) into the column's resolved kind.
pub fn coerce_cell(column: &ColumnDescriptor, raw: Option<&Value>, ctx: &CoercionContext<'_>) -> CellValue {
    let kind = column.kind.value_kind();
    let raw = match raw {
        None | Some(Value::Null) => {
            // An unchecked checkbox is simply not stored.
            return if *kind == ResolvedKind::Boolean {
                CellValue::Boolean(false)
            } else {
                CellValue::Empty
            };
        }
        Some(value) => value,
    };

    let cell = match kind {
        ResolvedKind::Text => coerce_text(&column.native_type, raw, ctx),
        ResolvedKind::Number => coerce_number(column, raw, ctx),
        ResolvedKind::Boolean => CellValue::Boolean(is_truthy(first_scalar(raw))),
        ResolvedKind::Date => parse_timestamp(first_scalar(raw))
            .map(|instant| CellValue::Date(instant.date_naive()))
            .unwrap_or(CellValue::Empty),
        ResolvedKind::DateTime => parse_timestamp(first_scalar(raw))
            .map(CellValue::DateTime)
            .unwrap_or(CellValue::Empty),
        ResolvedKind::SingleSelect => coerce_single_select(column, raw),
        ResolvedKind::MultiSelect => coerce_multi_select(column, raw),
        ResolvedKind::Reference => coerce_reference(column, raw),
        ResolvedKind::Attachment => coerce_attachments(raw),
        ResolvedKind::Collaborator => coerce_collaborators(raw, ctx),
        // value_kind() already unwrapped the computed result.
        ResolvedKind::Computed(_) => CellValue::Empty,
    };

    if cell.is_empty() {
        scrape_debug!(
            "column {:?} ({}): value {} did not coerce to {}",
            column.name,
            column.native_type,
            raw,
            kind
        );
    }
    cell
}

fn coerce_text(native_type: &str, raw: &Value, ctx: &CoercionContext<'_>) -> CellValue {
    let text = match (native_type, raw) {
        ("richText", Value::Object(doc)) => rich_text(doc),
        ("barcode", Value::Object(code)) => str_field(code, &["text"]).unwrap_or_default(),
        ("button", Value::Object(button)) => str_field(button, &["url", "label"]).unwrap_or_default(),
        _ => text_of(raw, &ctx.options.text_joiner),
    };
    if text.is_empty() {
        CellValue::Empty
    } else {
        CellValue::Text(text)
    }
}

/// Best-effort string for any stored value.
fn text_of(raw: &Value, joiner: &str) -> String {
    match raw {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(|item| text_of(item, joiner))
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(joiner),
        Value::Object(map) => str_field(map, &["foreignRowDisplayName", "name", "text", "filename", "url"])
            .unwrap_or_else(|| raw.to_string()),
    }
}

fn rich_text(doc: &Map<String, Value>) -> String {
    doc.get("documentValue")
        .and_then(Value::as_array)
        .map(|sections| {
            sections
                .iter()
                .filter_map(|section| section.get("insert").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default()
        .trim()
        .to_string()
}

fn coerce_number(column: &ColumnDescriptor, raw: &Value, ctx: &CoercionContext<'_>) -> CellValue {
    let parsed = match first_scalar(raw) {
        Value::Number(n) => n.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(n) if n.is_finite() => {
            let scaled = if column.native_type == "percent"
                && ctx.options.percent_scale == PercentScale::WholeNumber
            {
                n / 100.0
            } else {
                n
            };
            CellValue::Number(scaled)
        }
        _ => CellValue::Empty,
    }
}

fn is_truthy(raw: &Value) -> bool {
    match raw {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(text) => {
            let t = text.trim();
            !(t.is_empty() || t.eq_ignore_ascii_case("false") || t == "0")
        }
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Accepts RFC 3339, a naive `YYYY-MM-DDTHH:MM:SS[.f]` (taken as UTC) or a bare date.
pub fn parse_timestamp(raw: &Value) -> Option<DateTime<Utc>> {
    let text = raw.as_str()?.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(text) {
        return Some(instant.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn coerce_single_select(column: &ColumnDescriptor, raw: &Value) -> CellValue {
    match first_scalar(raw) {
        Value::String(token) => column
            .choices
            .get(token)
            .map(|label| CellValue::Text(label.clone()))
            .unwrap_or(CellValue::Empty),
        Value::Object(choice) => str_field(choice, &["name"])
            .map(CellValue::Text)
            .unwrap_or(CellValue::Empty),
        _ => CellValue::Empty,
    }
}

fn coerce_multi_select(column: &ColumnDescriptor, raw: &Value) -> CellValue {
    let tokens: Vec<&Value> = match raw {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    let labels = tokens
        .into_iter()
        .filter_map(|token| {
            let label = match token {
                Value::String(id) => column.choices.get(id).cloned(),
                Value::Object(choice) => str_field(choice, &["name"]),
                _ => None,
            };
            if label.is_none() {
                scrape_debug!("column {:?}: dropping unknown choice {}", column.name, token);
            }
            label
        })
        .collect();
    CellValue::List(labels)
}

fn coerce_reference(column: &ColumnDescriptor, raw: &Value) -> CellValue {
    let mut flat = Vec::new();
    match raw {
        Value::Object(lookup) if lookup.contains_key("valuesByForeignRowId") => {
            flatten_lookup(lookup, &column.choices, &mut flat);
        }
        other => flatten_values(other, &column.choices, &mut flat),
    }
    CellValue::List(flat)
}

/// Lookup cells are keyed by linked record; `foreignRowIdOrder` carries the display order.
fn flatten_lookup(lookup: &Map<String, Value>, choices: &BTreeMap<String, String>, out: &mut Vec<String>) {
    let Some(values) = lookup.get("valuesByForeignRowId").and_then(Value::as_object) else {
        return;
    };
    let order: Vec<&str> = lookup
        .get("foreignRowIdOrder")
        .and_then(Value::as_array)
        .map(|ids| ids.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    if order.is_empty() {
        for value in values.values() {
            flatten_values(value, choices, out);
        }
        return;
    }
    for row_id in order {
        if let Some(value) = values.get(row_id) {
            flatten_values(value, choices, out);
        }
    }
}

fn flatten_values(raw: &Value, choices: &BTreeMap<String, String>, out: &mut Vec<String>) {
    match raw {
        Value::Null => {}
        Value::Array(items) => {
            for item in items {
                flatten_values(item, choices, out);
            }
        }
        Value::Object(map) => {
            if let Some(name) = str_field(map, &["foreignRowDisplayName", "name", "filename", "text"]) {
                out.push(name);
            } else if let Some(id) = str_field(map, &["foreignRowId", "id"]) {
                out.push(id);
            }
        }
        Value::String(token) => out.push(choices.get(token).cloned().unwrap_or_else(|| token.clone())),
        Value::Number(n) => out.push(n.to_string()),
        Value::Bool(b) => out.push(b.to_string()),
    }
}

fn coerce_attachments(raw: &Value) -> CellValue {
    let Value::Array(files) = raw else {
        return CellValue::Empty;
    };
    let attachments = files
        .iter()
        .filter_map(Value::as_object)
        .map(|file| Attachment {
            name: str_field(file, &["filename", "name"]).unwrap_or_default(),
            url: str_field(file, &["url"]),
            size: file.get("size").and_then(Value::as_u64),
            mime_type: str_field(file, &["type"]),
        })
        .collect();
    CellValue::Attachments(attachments)
}

fn coerce_collaborators(raw: &Value, ctx: &CoercionContext<'_>) -> CellValue {
    let entries: Vec<&Value> = match raw {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    let users = entries
        .into_iter()
        .filter_map(|entry| collaborator(entry, ctx.users))
        .collect::<Vec<_>>();
    if users.is_empty() {
        CellValue::Empty
    } else {
        CellValue::Collaborators(users)
    }
}

fn collaborator(raw: &Value, users: &BTreeMap<String, UserInfo>) -> Option<Collaborator> {
    match raw {
        Value::String(id) => Some(match users.get(id) {
            Some(user) => Collaborator {
                name: user.display_name(),
                id: id.clone(),
                email: user.email.clone(),
            },
            None => Collaborator {
                name: id.clone(),
                id: id.clone(),
                email: None,
            },
        }),
        Value::Object(map) => {
            let id = str_field(map, &["id", "userId"]).unwrap_or_default();
            let known = users.get(&id);
            let name = str_field(map, &["name"])
                .or_else(|| known.map(UserInfo::display_name))
                .or_else(|| str_field(map, &["email"]))
                .unwrap_or_else(|| id.clone());
            Some(Collaborator {
                name,
                email: str_field(map, &["email"]).or_else(|| known.and_then(|u| u.email.clone())),
                id,
            })
        }
        _ => None,
    }
}

/// Rollups and lookups-through-formulas may deliver a list for a single-valued kind.
fn first_scalar(raw: &Value) -> &Value {
    match raw {
        Value::Array(items) => items.iter().find(|item| !item.is_null()).unwrap_or(&Value::Null),
        other => other,
    }
}

fn str_field(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| map.get(*key).and_then(Value::as_str))
        .find(|value| !value.is_empty())
        .map(str::to_string)
}
