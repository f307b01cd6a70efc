use std::sync::LazyLock;

use airtable_core::{HeaderList, PayloadError};
use regex::Regex;
use scraper::{Html, Selector};
use scrape_logging::{scrape_debug, scrape_info, scrape_trace, scrape_warn};
use serde_json::Value;

use crate::DecodeError;

const SUCCESS_MSG: &str = "SUCCESS";

static URL_WITH_PARAMS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""?urlWithParams"?\s*:\s*"((?:[^"\\]|\\.)*)""#).expect("hardcoded regex pattern")
});
static HEADERS_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"var\s+headers\s*=\s*\{").expect("hardcoded regex pattern"));
static TABLE_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""table"\s*:\s*\{"#).expect("hardcoded regex pattern"));
static REQUEST_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""?requestId"?\s*:\s*"([^"]+)""#).expect("hardcoded regex pattern")
});
static SHARED_VIEW_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""sharedViewId"\s*:\s*"([^"]+)""#).expect("hardcoded regex pattern")
});
static SHARED_VIEW_TABLE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""sharedViewTableId"\s*:\s*"([^"]+)""#).expect("hardcoded regex pattern")
});
static APPLICATION_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""x-airtable-application-id"\s*:\s*"([^"]+)""#).expect("hardcoded regex pattern")
});
static USER_LOCALE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""x-user-locale"\s*:\s*"([^"]+)""#).expect("hardcoded regex pattern")
});
static VIEW_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"view(?:\\u002F|\\/|/)(viw[A-Za-z0-9]+)").expect("hardcoded regex pattern")
});

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("no shared view data found in the page")]
    NotFound,
    #[error("invalid JSON in {context}: {message}")]
    InvalidJson {
        context: &'static str,
        message: String,
    },
    #[error("data endpoint path {0:?} cannot be resolved")]
    InvalidEndpoint(String),
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Where the table data of a page lives.
#[derive(Debug, Clone, PartialEq)]
pub enum LocatedPayload {
    /// Table object (`{columns, rows, ...}`) embedded in the page itself.
    Inline(Value),
    /// Page points at a data endpoint that must be fetched with the announced headers.
    Endpoint {
        path_and_query: String,
        headers: HeaderList,
    },
    /// The service answered with an envelope whose `msg` is not a success.
    Refused(String),
}

/// Strategy for finding table data in a served page.
pub trait PayloadLocator: Send + Sync {
    fn locate(&self, page: &str) -> Result<LocatedPayload, ExtractionError>;
}

/// Locator for the hosted shared-view page layout.
///
/// Tries, in order: the body as JSON, a `"table": {...}` object inside a
/// `<script>`, then the `urlWithParams` / `var headers` pair.
#[derive(Debug, Default, Clone, Copy)]
pub struct SharedViewLocator;

impl PayloadLocator for SharedViewLocator {
    fn locate(&self, page: &str) -> Result<LocatedPayload, ExtractionError> {
        let trimmed = page.trim_start();
        if trimmed.starts_with('{') {
            if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
                if let Some(located) = from_json_body(value) {
                    scrape_info!("page body is the table payload");
                    return Ok(located);
                }
            }
        }

        if let Some(table) = inline_table(page) {
            scrape_info!("found table payload inline in a script");
            return Ok(LocatedPayload::Inline(table));
        }

        if let Some(path_and_query) = capture(&URL_WITH_PARAMS, page).map(|raw| decode_js_string(&raw)) {
            let headers = announced_headers(page)?;
            scrape_info!("page points at data endpoint {path_and_query}");
            return Ok(LocatedPayload::Endpoint {
                path_and_query,
                headers,
            });
        }

        Err(ExtractionError::NotFound)
    }
}

fn from_json_body(value: Value) -> Option<LocatedPayload> {
    if value.get("msg").is_none() {
        return is_table(&value).then_some(LocatedPayload::Inline(value));
    }
    match read_envelope(value) {
        Ok(located) => Some(located),
        Err(err) => {
            scrape_debug!("body JSON is not a table envelope: {err}");
            None
        }
    }
}

/// Read the data endpoint's reply: `{"msg": "SUCCESS", "data": {"table": {...}}}`.
/// Any other `msg` is a refusal, not an error.
pub fn read_endpoint_reply(text: &str) -> Result<LocatedPayload, ExtractionError> {
    let value: Value = serde_json::from_str(text).map_err(|err| ExtractionError::InvalidJson {
        context: "data endpoint reply",
        message: err.to_string(),
    })?;
    if value.get("msg").is_none() && is_table(&value) {
        return Ok(LocatedPayload::Inline(value));
    }
    read_envelope(value)
}

fn read_envelope(mut value: Value) -> Result<LocatedPayload, ExtractionError> {
    let msg = value.get("msg").and_then(Value::as_str).unwrap_or_default().to_string();
    if msg != SUCCESS_MSG {
        scrape_warn!("data endpoint answered msg {msg:?}");
        return Ok(LocatedPayload::Refused(msg));
    }
    match value.pointer_mut("/data/table").map(Value::take) {
        Some(table) if table.is_object() => Ok(LocatedPayload::Inline(table)),
        _ => Err(ExtractionError::NotFound),
    }
}

fn is_table(value: &Value) -> bool {
    value.get("columns").is_some_and(Value::is_array) && value.get("rows").is_some_and(Value::is_array)
}

fn inline_table(page: &str) -> Option<Value> {
    let doc = Html::parse_document(page);
    let script_sel = Selector::parse("script").ok()?;
    doc.select(&script_sel)
        .map(|script| script.text().collect::<String>())
        .enumerate()
        .find_map(|(index, text)| {
            let table = TABLE_KEY.find_iter(&text).find_map(|found| {
                // The match ends on the opening brace of the table object.
                let start = found.end() - 1;
                object_at(&text[start..]).filter(is_table)
            });
            if table.is_none() {
                scrape_trace!("script {index} ({} bytes) holds no table object", text.len());
            }
            table
        })
}

/// First JSON value at the start of `text`, ignoring whatever follows it.
fn object_at(text: &str) -> Option<Value> {
    serde_json::Deserializer::from_str(text)
        .into_iter::<Value>()
        .next()?
        .ok()
}

fn announced_headers(page: &str) -> Result<HeaderList, ExtractionError> {
    let Some(found) = HEADERS_OBJECT.find(page) else {
        scrape_warn!("page announces a data endpoint but no request headers");
        return Ok(Vec::new());
    };
    let value = object_at(&page[found.end() - 1..]).ok_or_else(|| ExtractionError::InvalidJson {
        context: "announced request headers",
        message: "not a JSON object".to_string(),
    })?;
    let Value::Object(map) = value else {
        return Err(ExtractionError::InvalidJson {
            context: "announced request headers",
            message: "not a JSON object".to_string(),
        });
    };
    Ok(map
        .into_iter()
        .map(|(name, value)| {
            let value = match value {
                Value::String(text) => text,
                other => other.to_string(),
            };
            (name, value)
        })
        .collect())
}

/// Body of a JavaScript string literal; `/` and `\/` escapes become `/`.
fn decode_js_string(raw: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{raw}\""))
        .unwrap_or_else(|_| raw.replace("\\u002F", "/").replace("\\/", "/"))
}

fn capture(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Identifiers and request context scanned from the page text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageInfo {
    pub request_id: Option<String>,
    pub shared_view_id: Option<String>,
    pub table_id: Option<String>,
    pub view_id: Option<String>,
    pub application_id: Option<String>,
    pub user_locale: Option<String>,
    /// Decoded `urlWithParams`, when present.
    pub url_with_params: Option<String>,
}

impl PageInfo {
    pub fn scan(page: &str) -> Self {
        Self {
            request_id: capture(&REQUEST_ID, page),
            shared_view_id: capture(&SHARED_VIEW_ID, page),
            table_id: capture(&SHARED_VIEW_TABLE_ID, page),
            view_id: capture(&VIEW_SEGMENT, page),
            application_id: capture(&APPLICATION_ID, page),
            user_locale: capture(&USER_LOCALE, page),
            url_with_params: capture(&URL_WITH_PARAMS, page).map(|raw| decode_js_string(&raw)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn js_string_escapes_are_decoded() {
        assert_eq!(
            decode_js_string(r"\u002Fv0.3\u002Fview\u002FviwA\u002FreadSharedViewData?x=1"),
            "/v0.3/view/viwA/readSharedViewData?x=1"
        );
        assert_eq!(decode_js_string(r"\/a\/b"), "/a/b");
    }

    #[test]
    fn object_at_ignores_trailing_script() {
        let value = object_at(r#"{"a": {"b": [1, 2]}}; var next = 3;"#).unwrap();
        assert_eq!(value["a"]["b"][1], 2);
    }
}
