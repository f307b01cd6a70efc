//! Command line front end: open one shared view and print or save its table.

mod logging;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use airtable_core::{DelimitedOptions, JsonOptions, Orientation, PercentScale};
use airtable_engine::{write_atomic, ReqwestFetcher, SessionOptions, SharedView};
use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use scrape_logging::{scrape_error, scrape_info, scrape_warn};

use crate::logging::LogDestination;

/// Exit status for a view that answered but yielded no table.
const SOFT_FAILURE_EXIT: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Delimited text built from the typed table
    Csv,
    /// Row objects as JSON; `--orient` picks the shape
    Json,
    /// Shorthand for `--format json --orient records`
    Records,
    /// Shorthand for `--format json --orient index`
    Index,
    /// Column names, native types and observed value kinds
    Summary,
    /// The CSV the service renders for the view itself
    Native,
}

#[derive(Debug, Parser)]
#[command(name = "airtable_cli")]
#[command(about = "Export the table behind a public Airtable shared view", long_about = None)]
struct Cli {
    /// Shared-view URL, e.g. https://airtable.com/appXXXX/shrXXXX
    url: String,

    #[arg(long, value_enum, default_value_t = Format::Csv)]
    format: Format,

    /// Write to this file instead of stdout
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Field delimiter for delimited output
    #[arg(long, default_value_t = ',')]
    delimiter: char,

    /// Separator between items of multi-valued cells
    #[arg(long, default_value = ",")]
    joiner: String,

    /// Time zone announced to the service (`x-time-zone`)
    #[arg(long)]
    time_zone: Option<String>,

    /// JSON shape for `--format json`
    #[arg(long, default_value_t = Orientation::Records)]
    orient: Orientation,

    /// Percent fields are stored as whole numbers (50 means 50%)
    #[arg(long)]
    whole_percent: bool,

    /// Per-request timeout in seconds; no timeout when omitted
    #[arg(long)]
    timeout: Option<u64>,

    /// Indent JSON output
    #[arg(long)]
    pretty: bool,

    /// Log debug detail
    #[arg(long, short)]
    verbose: bool,

    /// Also write the log to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Keep the log off the terminal
    #[arg(long, short)]
    quiet: bool,
}

impl Cli {
    fn log_destination(&self) -> Option<LogDestination> {
        match (&self.log_file, self.quiet) {
            (Some(path), true) => Some(LogDestination::File(path.clone())),
            (Some(path), false) => Some(LogDestination::Both(path.clone())),
            (None, true) => None,
            (None, false) => Some(LogDestination::Terminal),
        }
    }

    fn session_options(&self) -> SessionOptions {
        let mut options = SessionOptions::default();
        if let Some(time_zone) = &self.time_zone {
            options.fetch.time_zone = time_zone.clone();
        }
        options.fetch.request_timeout = self.timeout.map(Duration::from_secs);
        if self.whole_percent {
            options.coercion.percent_scale = PercentScale::WholeNumber;
        }
        options.coercion.text_joiner = self.joiner.clone();
        options
    }

    fn delimited_options(&self) -> DelimitedOptions {
        DelimitedOptions {
            delimiter: self.delimiter,
            joiner: self.joiner.clone(),
            ..DelimitedOptions::default()
        }
    }

    /// Shape of JSON output; the `records` and `index` formats fix it.
    fn orientation(&self) -> Orientation {
        match self.format {
            Format::Records => Orientation::Records,
            Format::Index => Orientation::Index,
            _ => self.orient,
        }
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    if let Some(destination) = cli.log_destination() {
        logging::initialize(destination, cli.verbose);
    }

    match run(&cli) {
        Ok(code) => Ok(code),
        Err(err) => {
            scrape_error!("{err:#}");
            Err(err)
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let options = cli.session_options();
    let view = SharedView::open(&cli.url, options.clone())
        .with_context(|| format!("could not open {}", cli.url))?;

    if !view.succeeded() {
        scrape_warn!(
            "{}: {}",
            view.url(),
            view.failure().unwrap_or("no table data")
        );
        return Ok(ExitCode::from(SOFT_FAILURE_EXIT));
    }

    let output = cli.output.as_deref();
    let text = match cli.format {
        Format::Csv => view.to_csv(&cli.delimited_options(), output)?,
        Format::Summary => deliver(format!("{}\n", view.schema_summary()), output)?,
        Format::Native => {
            let fetcher = ReqwestFetcher::new(options.fetch);
            match view.fetch_native_csv(&fetcher)? {
                Some(csv) => deliver(csv, output)?,
                None => bail!("{} does not offer a CSV download", view.url()),
            }
        }
        Format::Json | Format::Records | Format::Index => match cli.orientation() {
            Orientation::Records => view.to_json(&JsonOptions { pretty: cli.pretty }, output)?,
            Orientation::Index => {
                let value = view.to_mapping(Orientation::Index);
                let text = if cli.pretty {
                    serde_json::to_string_pretty(&value)?
                } else {
                    value.to_string()
                };
                deliver(text, output)?
            }
        },
    };

    if let Some(text) = text {
        print!("{text}");
        if !text.ends_with('\n') {
            println!();
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Write `text` to `path` when one is given, otherwise hand it back for stdout.
fn deliver(text: String, path: Option<&Path>) -> Result<Option<String>> {
    let Some(path) = path else {
        return Ok(Some(text));
    };
    write_atomic(path, &text).with_context(|| format!("could not write {}", path.display()))?;
    scrape_info!("wrote {}", path.display());
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_export_csv_to_stdout() {
        let cli = Cli::try_parse_from(["airtable_cli", "https://airtable.com/app1/shr2"]).unwrap();
        assert_eq!(cli.format, Format::Csv);
        assert_eq!(cli.output, None);
        assert_eq!(cli.orientation(), Orientation::Records);
        assert_eq!(cli.delimited_options(), DelimitedOptions::default());

        let options = cli.session_options();
        assert_eq!(options.fetch.time_zone, "America/New_York");
        assert_eq!(options.fetch.request_timeout, None);
        assert_eq!(options.coercion.percent_scale, PercentScale::Fraction);
        assert!(matches!(cli.log_destination(), Some(LogDestination::Terminal)));
    }

    #[test]
    fn flags_reach_the_option_structs() {
        let cli = Cli::try_parse_from([
            "airtable_cli",
            "https://airtable.com/app1/shr2",
            "--format",
            "json",
            "--orient",
            "index",
            "--delimiter",
            "\t",
            "--joiner",
            "; ",
            "--time-zone",
            "Europe/Oslo",
            "--whole-percent",
            "--timeout",
            "30",
            "--log-file",
            "scrape.log",
            "--quiet",
        ])
        .unwrap();

        assert_eq!(cli.orientation(), Orientation::Index);
        let delimited = cli.delimited_options();
        assert_eq!(delimited.delimiter, '\t');
        assert_eq!(delimited.joiner, "; ");

        let options = cli.session_options();
        assert_eq!(options.fetch.time_zone, "Europe/Oslo");
        assert_eq!(options.fetch.request_timeout, Some(Duration::from_secs(30)));
        assert_eq!(options.coercion.percent_scale, PercentScale::WholeNumber);
        assert_eq!(options.coercion.text_joiner, "; ");
        assert!(matches!(
            cli.log_destination(),
            Some(LogDestination::File(path)) if path == Path::new("scrape.log")
        ));
    }

    #[test]
    fn format_shorthands_pick_the_orientation() {
        let parse = |format: &str| {
            Cli::try_parse_from(["airtable_cli", "u", "--format", format])
                .unwrap()
                .orientation()
        };
        assert_eq!(parse("records"), Orientation::Records);
        assert_eq!(parse("index"), Orientation::Index);
        assert_eq!(parse("json"), Orientation::Records);
    }

    #[test]
    fn unknown_format_is_rejected() {
        assert!(Cli::try_parse_from(["airtable_cli", "u", "--format", "xlsx"]).is_err());
    }
}
