use std::collections::BTreeMap;
use std::fmt;

use scrape_logging::scrape_warn;
use serde_json::Value;

use crate::payload::RawColumn;

/// Target value category a cell is coerced into, independent of the native tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResolvedKind {
    Text,
    Number,
    Boolean,
    Date,
    DateTime,
    SingleSelect,
    MultiSelect,
    Reference,
    Attachment,
    Collaborator,
    /// Formula or rollup; cells are coerced with the declared result kind.
    Computed(Box<ResolvedKind>),
}

impl ResolvedKind {
    /// Kind that actually shapes the cell value (computed kinds unwrap to their result).
    pub fn value_kind(&self) -> &ResolvedKind {
        match self {
            ResolvedKind::Computed(inner) => inner.value_kind(),
            other => other,
        }
    }

    /// Kinds whose cells hold a list of values.
    pub fn is_multi_valued(&self) -> bool {
        matches!(
            self.value_kind(),
            ResolvedKind::MultiSelect
                | ResolvedKind::Reference
                | ResolvedKind::Attachment
                | ResolvedKind::Collaborator
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResolvedKind::Text => "text",
            ResolvedKind::Number => "number",
            ResolvedKind::Boolean => "boolean",
            ResolvedKind::Date => "date",
            ResolvedKind::DateTime => "datetime",
            ResolvedKind::SingleSelect => "single-select",
            ResolvedKind::MultiSelect => "multi-select",
            ResolvedKind::Reference => "reference",
            ResolvedKind::Attachment => "attachment",
            ResolvedKind::Collaborator => "collaborator",
            ResolvedKind::Computed(_) => "computed",
        }
    }
}

impl fmt::Display for ResolvedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedKind::Computed(inner) => write!(f, "computed({inner})"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// One declared column after schema resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    pub id: String,
    pub name: String,
    pub native_type: String,
    pub kind: ResolvedKind,
    pub ordinal: usize,
    /// Choice id -> display label, for select columns and lookups of them.
    pub choices: BTreeMap<String, String>,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, native_type: impl Into<String>, kind: ResolvedKind) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
            native_type: native_type.into(),
            kind,
            ordinal: 0,
            choices: BTreeMap::new(),
        }
    }
}

/// Resolve every raw column, keeping declared order.
pub fn resolve_columns(raw: &[RawColumn]) -> Vec<ColumnDescriptor> {
    raw.iter()
        .enumerate()
        .map(|(ordinal, column)| resolve_column(column, ordinal))
        .collect()
}

pub fn resolve_column(raw: &RawColumn, ordinal: usize) -> ColumnDescriptor {
    let options = raw.type_options.as_ref();
    let kind = match resolve_tag(&raw.type_tag, options) {
        Some(kind) => kind,
        None => {
            scrape_warn!(
                "column {:?} has unknown type {:?}; treating it as text",
                raw.name,
                raw.type_tag
            );
            ResolvedKind::Text
        }
    };
    let name = if raw.name.is_empty() {
        raw.id.clone()
    } else {
        raw.name.clone()
    };

    ColumnDescriptor {
        id: raw.id.clone(),
        name,
        native_type: raw.type_tag.clone(),
        kind,
        ordinal,
        choices: options.map(choice_table).unwrap_or_default(),
    }
}

/// Fixed tag table. `None` means the tag is unknown to this version.
pub fn resolve_tag(tag: &str, options: Option<&Value>) -> Option<ResolvedKind> {
    let kind = match tag {
        "text" | "singleLineText" | "multilineText" | "richText" | "phone" | "phoneNumber"
        | "email" | "url" | "barcode" | "button" => ResolvedKind::Text,
        "number" | "currency" | "percent" | "rating" | "duration" | "autoNumber" | "count" => {
            ResolvedKind::Number
        }
        "checkbox" => ResolvedKind::Boolean,
        "date" => {
            let is_date_time = options
                .and_then(|o| o.get("isDateTime"))
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if is_date_time {
                ResolvedKind::DateTime
            } else {
                ResolvedKind::Date
            }
        }
        "dateTime" | "createdTime" | "lastModifiedTime" => ResolvedKind::DateTime,
        "select" | "singleSelect" => ResolvedKind::SingleSelect,
        "multiSelect" | "multipleSelects" => ResolvedKind::MultiSelect,
        "foreignKey" | "multipleRecordLinks" | "lookup" | "multipleLookupValues" => {
            ResolvedKind::Reference
        }
        "multipleAttachment" | "multipleAttachments" => ResolvedKind::Attachment,
        "collaborator" | "singleCollaborator" | "multipleCollaborators" | "createdBy"
        | "lastModifiedBy" | "computation" => ResolvedKind::Collaborator,
        "formula" | "rollup" => ResolvedKind::Computed(Box::new(computed_result(options))),
        _ => return None,
    };
    Some(kind)
}

fn computed_result(options: Option<&Value>) -> ResolvedKind {
    let Some(result_type) = options
        .and_then(|o| o.get("resultType"))
        .and_then(Value::as_str)
    else {
        return ResolvedKind::Text;
    };
    // The result options (e.g. isDateTime) live next to resultType.
    match resolve_tag(result_type, options) {
        Some(ResolvedKind::Computed(_)) | None => ResolvedKind::Text,
        Some(kind) => kind,
    }
}

/// `typeOptions.choices` is an object keyed by choice id; an array form is accepted too.
fn choice_table(options: &Value) -> BTreeMap<String, String> {
    let entries: Vec<&Value> = match options.get("choices") {
        Some(Value::Object(map)) => map.values().collect(),
        Some(Value::Array(list)) => list.iter().collect(),
        _ => return BTreeMap::new(),
    };
    entries
        .into_iter()
        .filter_map(|choice| {
            let id = choice.get("id")?.as_str()?;
            let name = choice.get("name")?.as_str()?;
            Some((id.to_string(), name.to_string()))
        })
        .collect()
}
