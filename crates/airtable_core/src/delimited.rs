use std::mem::take;

use crate::table::Table;
use crate::value::{format_date, format_date_time, CellValue};

/// Options for delimited-text output. Defaults produce RFC 4180 style CSV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelimitedOptions {
    pub delimiter: char,
    /// Joiner for multi-valued cells (multi-select, references, attachments, collaborators).
    pub joiner: String,
    pub true_text: String,
    pub false_text: String,
    pub include_header: bool,
    pub line_ending: String,
}

impl Default for DelimitedOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            joiner: ",".to_string(),
            true_text: "True".to_string(),
            false_text: "False".to_string(),
            include_header: true,
            line_ending: "\n".to_string(),
        }
    }
}

impl DelimitedOptions {
    pub fn tsv() -> Self {
        Self {
            delimiter: '\t',
            ..Self::default()
        }
    }
}

/// Field text of one cell; empty markers render as an empty field.
pub fn render_cell(cell: &CellValue, options: &DelimitedOptions) -> String {
    match cell {
        CellValue::Empty => String::new(),
        CellValue::Text(text) => text.clone(),
        CellValue::Number(n) => n.to_string(),
        CellValue::Boolean(true) => options.true_text.clone(),
        CellValue::Boolean(false) => options.false_text.clone(),
        CellValue::Date(date) => format_date(date),
        CellValue::DateTime(instant) => format_date_time(instant),
        CellValue::List(_) | CellValue::Attachments(_) | CellValue::Collaborators(_) => {
            cell.display_values().join(&options.joiner)
        }
    }
}

/// Serialize the table: header row (raw column names) then rows in order.
pub fn to_delimited_string(table: &Table, options: &DelimitedOptions) -> String {
    let mut out = String::new();
    if options.include_header {
        let header: Vec<String> = table.column_names().into_iter().map(str::to_string).collect();
        push_record(&mut out, &header, options);
    }
    for row in table.rows() {
        let fields: Vec<String> = row.cells().iter().map(|c| render_cell(c, options)).collect();
        push_record(&mut out, &fields, options);
    }
    out
}

fn needs_quotes(field: &str, sep: char) -> bool {
    field.contains(sep) || field.contains('"') || field.contains('\n') || field.contains('\r')
}

fn push_record(out: &mut String, fields: &[String], options: &DelimitedOptions) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(options.delimiter);
        }
        if needs_quotes(field, options.delimiter) {
            out.push('"');
            out.push_str(&field.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(field);
        }
    }
    out.push_str(&options.line_ending);
}

/// Read delimited text back into records (quotes and CRLF tolerant).
/// A trailing line ending does not produce an extra record.
pub fn parse_delimited(text: &str, sep: char) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut field = String::new();
    let mut row = Vec::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                if in_quotes {
                    if matches!(chars.peek(), Some('"')) {
                        chars.next();
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                } else {
                    in_quotes = true;
                }
            }
            c if c == sep && !in_quotes => row.push(take(&mut field)),
            '\n' | '\r' if !in_quotes => {
                if ch == '\r' && matches!(chars.peek(), Some('\n')) {
                    chars.next();
                }
                row.push(take(&mut field));
                rows.push(take(&mut row));
            }
            _ => field.push(ch),
        }
    }

    // Flush a final record without line ending, even if quotes were unterminated.
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }
    rows
}
