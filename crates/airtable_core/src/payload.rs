use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type HeaderList = Vec<(String, String)>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("table structure is not a JSON object")]
    NotAnObject,
    #[error("table structure has no {0:?} array")]
    MissingArray(&'static str),
    #[error("invalid {kind} record at position {index}: {message}")]
    InvalidRecord {
        kind: &'static str,
        index: usize,
        message: String,
    },
}

/// Column metadata as served by the view, addressed by an opaque column id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawColumn {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default = "default_type_tag")]
    pub type_tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_options: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_type_tag() -> String {
    "text".to_string()
}

/// One record of the view; cells are sparse and keyed by column id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRow {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<String>,
    #[serde(default)]
    pub cell_values_by_column_id: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl UserInfo {
    pub fn display_name(&self) -> String {
        let joined = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if !joined.is_empty() {
            return joined;
        }
        self.name
            .clone()
            .or_else(|| self.email.clone())
            .unwrap_or_else(|| self.id.clone())
    }
}

/// The as-extracted, pre-coercion structures of one fetch.
///
/// Never mutated after construction; a fresh fetch produces a fresh payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawPayload {
    status: u16,
    headers: HeaderList,
    table_id: Option<String>,
    view_id: Option<String>,
    application_id: Option<String>,
    columns: Vec<RawColumn>,
    rows: Vec<RawRow>,
    users: BTreeMap<String, UserInfo>,
}

impl RawPayload {
    /// Payload of a fetch that produced no table (soft failure).
    pub fn empty(status: u16, headers: HeaderList) -> Self {
        Self {
            status,
            headers,
            ..Self::default()
        }
    }

    /// Decode the table object (`{id, columns, rows, viewOrder, appBlanket, ...}`).
    pub fn from_table(status: u16, headers: HeaderList, table: &Value) -> Result<Self, PayloadError> {
        let object = table.as_object().ok_or(PayloadError::NotAnObject)?;
        let raw_columns = object
            .get("columns")
            .and_then(Value::as_array)
            .ok_or(PayloadError::MissingArray("columns"))?;
        let raw_rows = object
            .get("rows")
            .and_then(Value::as_array)
            .ok_or(PayloadError::MissingArray("rows"))?;

        let columns = decode_records::<RawColumn>(raw_columns, "column")?;
        let rows = decode_records::<RawRow>(raw_rows, "row")?;

        let view_id = match object.get("viewOrder") {
            Some(Value::Array(order)) => order.first().and_then(Value::as_str).map(str::to_string),
            Some(Value::String(id)) => Some(id.clone()),
            _ => None,
        };

        Ok(Self {
            status,
            headers,
            table_id: string_field(object, "id"),
            view_id,
            application_id: string_field(object, "applicationId"),
            columns,
            rows,
            users: decode_users(object),
        })
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn table_id(&self) -> Option<&str> {
        self.table_id.as_deref()
    }

    pub fn view_id(&self) -> Option<&str> {
        self.view_id.as_deref()
    }

    pub fn application_id(&self) -> Option<&str> {
        self.application_id.as_deref()
    }

    pub fn raw_columns(&self) -> &[RawColumn] {
        &self.columns
    }

    pub fn raw_rows(&self) -> &[RawRow] {
        &self.rows
    }

    pub fn users(&self) -> &BTreeMap<String, UserInfo> {
        &self.users
    }

    pub fn has_table(&self) -> bool {
        !self.columns.is_empty() || !self.rows.is_empty()
    }

    /// Raw column records as JSON, for inspection.
    pub fn columns_json(&self) -> Value {
        serde_json::to_value(&self.columns).unwrap_or(Value::Null)
    }

    /// Raw row records as JSON, for inspection.
    pub fn rows_json(&self) -> Value {
        serde_json::to_value(&self.rows).unwrap_or(Value::Null)
    }
}

fn decode_records<T: for<'de> Deserialize<'de>>(
    records: &[Value],
    kind: &'static str,
) -> Result<Vec<T>, PayloadError> {
    records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            T::deserialize(record).map_err(|err| PayloadError::InvalidRecord {
                kind,
                index,
                message: err.to_string(),
            })
        })
        .collect()
}

fn string_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object.get(key).and_then(Value::as_str).map(str::to_string)
}

fn decode_users(object: &Map<String, Value>) -> BTreeMap<String, UserInfo> {
    let Some(by_id) = object
        .get("appBlanket")
        .and_then(|blanket| blanket.get("userInfoById"))
        .and_then(Value::as_object)
    else {
        return BTreeMap::new();
    };

    by_id
        .iter()
        .filter_map(|(id, info)| {
            let mut user = UserInfo::deserialize(info).ok()?;
            if user.id.is_empty() {
                user.id = id.clone();
            }
            Some((id.clone(), user))
        })
        .collect()
}
