use std::path::{Path, PathBuf};

use airtable_core::{to_delimited_string, to_json_string, DelimitedOptions, JsonOptions, Table};
use scrape_logging::scrape_info;

use crate::persist::{write_atomic, PersistError};

const DELIMITED_EXTENSIONS: &[&str] = &["csv", "tsv", "txt"];
const JSON_EXTENSIONS: &[&str] = &["json"];

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("{path:?} must end in one of {expected:?}")]
    WrongExtension {
        path: PathBuf,
        expected: &'static [&'static str],
    },
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Delimited-text export. With a path the text is written there and `None`
/// is returned; without one the text is returned.
pub fn export_delimited(
    table: &Table,
    options: &DelimitedOptions,
    path: Option<&Path>,
) -> Result<Option<String>, ExportError> {
    let text = to_delimited_string(table, options);
    deliver(text, path, DELIMITED_EXTENSIONS)
}

/// Structured-text export, same path convention as [`export_delimited`].
pub fn export_json(
    table: &Table,
    options: &JsonOptions,
    path: Option<&Path>,
) -> Result<Option<String>, ExportError> {
    let text = to_json_string(table, options);
    deliver(text, path, JSON_EXTENSIONS)
}

fn deliver(
    text: String,
    path: Option<&Path>,
    expected: &'static [&'static str],
) -> Result<Option<String>, ExportError> {
    let Some(path) = path else {
        return Ok(Some(text));
    };
    check_extension(path, expected)?;
    write_atomic(path, &text)?;
    scrape_info!("wrote {} bytes to {}", text.len(), path.display());
    Ok(None)
}

fn check_extension(path: &Path, expected: &'static [&'static str]) -> Result<(), ExportError> {
    let matches = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| expected.iter().any(|e| e.eq_ignore_ascii_case(ext)));
    if matches {
        Ok(())
    } else {
        Err(ExportError::WrongExtension {
            path: path.to_path_buf(),
            expected,
        })
    }
}
