use std::path::Path;

use airtable_core::{
    assemble, schema_summary, to_mapping, CoercionOptions, ColumnDescriptor, DelimitedOptions,
    Frame, HeaderList, JsonOptions, MalformedUrlError, Orientation, RawPayload, ShareReference,
    Table,
};
use scrape_logging::{scrape_debug, scrape_info, scrape_warn};
use serde_json::Value;
use url::Url;

use crate::export::{export_delimited, export_json, ExportError};
use crate::fetch::{FetchSettings, PageFetcher, ReqwestFetcher};
use crate::locate::{
    read_endpoint_reply, ExtractionError, LocatedPayload, PageInfo, PayloadLocator, SharedViewLocator,
};
use crate::{decode_body, FetchError, FetchOutput};

#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error(transparent)]
    MalformedUrl(#[from] MalformedUrlError),
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionError),
}

#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub fetch: FetchSettings,
    pub coercion: CoercionOptions,
}

/// A point-in-time snapshot of one shared view.
///
/// Opening performs the whole fetch, extract and assemble pipeline. A
/// non-success HTTP status or a refused data request does not fail the open:
/// the session records it, keeps an empty table, and [`SharedView::succeeded`]
/// reports `false`.
#[derive(Debug, Clone)]
pub struct SharedView {
    share: ShareReference,
    url: Url,
    options: SessionOptions,
    page_info: PageInfo,
    request_headers: HeaderList,
    payload: RawPayload,
    table: Table,
    failure: Option<String>,
}

impl SharedView {
    /// Open a shared-view URL with the default fetcher and locator.
    pub fn open(url: &str, options: SessionOptions) -> Result<Self, ScrapeError> {
        let share = ShareReference::parse(url)?;
        let page_url = parse_url(url.trim())?;
        let fetcher = ReqwestFetcher::new(options.fetch.clone());
        Self::open_with(share, page_url, options, &fetcher, &SharedViewLocator)
    }

    /// Open the view identified by an explicit app/share pair on `options.fetch.base_url`.
    pub fn open_ids(app_id: &str, share_id: &str, options: SessionOptions) -> Result<Self, ScrapeError> {
        let share = ShareReference::from_ids(app_id, share_id)?;
        let page_url = share.page_url(&parse_url(&options.fetch.base_url)?);
        let fetcher = ReqwestFetcher::new(options.fetch.clone());
        Self::open_with(share, page_url, options, &fetcher, &SharedViewLocator)
    }

    pub fn open_with(
        share: ShareReference,
        page_url: Url,
        options: SessionOptions,
        fetcher: &dyn PageFetcher,
        locator: &dyn PayloadLocator,
    ) -> Result<Self, ScrapeError> {
        let page_headers = options.fetch.page_headers();
        let page = fetcher.fetch(&page_url, &page_headers)?;

        let mut session = Self {
            share,
            url: page_url,
            options,
            page_info: PageInfo::default(),
            request_headers: page_headers,
            payload: RawPayload::default(),
            table: Table::default(),
            failure: None,
        };

        if !page.is_success() {
            let reason = format!("page answered HTTP status {}", page.status);
            session.soft_failure(page, reason);
            return Ok(session.finish());
        }

        let text = decode_body(&page.bytes, page.metadata.content_type.as_deref())
            .map_err(ExtractionError::from)?
            .text;
        session.page_info = PageInfo::scan(&text);

        match locator.locate(&text)? {
            LocatedPayload::Inline(table) => session.accept(page, &table)?,
            LocatedPayload::Refused(msg) => session.soft_failure(page, format!("service answered {msg:?}")),
            LocatedPayload::Endpoint {
                path_and_query,
                headers,
            } => {
                let endpoint = parse_url(&session.options.fetch.base_url)?
                    .join(&path_and_query)
                    .map_err(|_| ExtractionError::InvalidEndpoint(path_and_query.clone()))?;
                session.request_headers = session.options.fetch.endpoint_headers(&headers);
                let reply = fetcher.fetch(&endpoint, &session.request_headers)?;
                if !reply.is_success() {
                    let reason = format!("data endpoint answered HTTP status {}", reply.status);
                    session.soft_failure(reply, reason);
                    return Ok(session.finish());
                }
                let text = decode_body(&reply.bytes, reply.metadata.content_type.as_deref())
                    .map_err(ExtractionError::from)?
                    .text;
                match read_endpoint_reply(&text)? {
                    LocatedPayload::Inline(table) => session.accept(reply, &table)?,
                    LocatedPayload::Refused(msg) => {
                        session.soft_failure(reply, format!("data endpoint answered {msg:?}"))
                    }
                    LocatedPayload::Endpoint { .. } => return Err(ExtractionError::NotFound.into()),
                }
            }
        }

        Ok(session.finish())
    }

    fn accept(&mut self, output: FetchOutput, table: &Value) -> Result<(), ExtractionError> {
        self.payload = RawPayload::from_table(output.status, output.headers, table)?;
        self.table = assemble(&self.payload, &self.options.coercion);
        Ok(())
    }

    fn soft_failure(&mut self, output: FetchOutput, reason: String) {
        scrape_warn!("{}: {reason}; table left empty", self.url);
        self.payload = RawPayload::empty(output.status, output.headers);
        self.table = Table::default();
        self.failure = Some(reason);
    }

    fn finish(mut self) -> Self {
        self.share = self.share.resolved(
            self.payload.table_id().or(self.page_info.table_id.as_deref()),
            self.payload.view_id().or(self.page_info.view_id.as_deref()),
        );
        scrape_info!(
            "opened {} ({} columns, {} rows, status {})",
            self.url,
            self.table.columns().len(),
            self.table.len(),
            self.status()
        );
        self
    }

    /// `true` when the data was fetched with a success status and not refused.
    pub fn succeeded(&self) -> bool {
        self.failure.is_none() && (200..300).contains(&self.status())
    }

    /// Why the table is empty, for soft failures.
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// HTTP status of the response the table came from (or that stopped it).
    pub fn status(&self) -> u16 {
        self.payload.status()
    }

    pub fn response_headers(&self) -> &[(String, String)] {
        self.payload.headers()
    }

    /// Headers sent with the request the table came from.
    pub fn request_headers(&self) -> &[(String, String)] {
        &self.request_headers
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn share(&self) -> &ShareReference {
        &self.share
    }

    pub fn share_id(&self) -> &str {
        self.share.share_id()
    }

    /// Application id from the payload, else from the page, else from the URL.
    pub fn app_id(&self) -> &str {
        self.payload
            .application_id()
            .or(self.page_info.application_id.as_deref())
            .unwrap_or(self.share.app_id())
    }

    pub fn table_id(&self) -> Option<&str> {
        self.share.table_id()
    }

    pub fn view_id(&self) -> Option<&str> {
        self.share.view_id()
    }

    /// Per-request id the page was served with.
    pub fn request_id(&self) -> Option<&str> {
        self.page_info.request_id.as_deref()
    }

    pub fn page_info(&self) -> &PageInfo {
        &self.page_info
    }

    pub fn payload(&self) -> &RawPayload {
        &self.payload
    }

    /// Raw column records, before resolution.
    pub fn raw_columns(&self) -> Value {
        self.payload.columns_json()
    }

    /// Raw row records, before coercion.
    pub fn raw_rows(&self) -> Value {
        self.payload.rows_json()
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        self.table.columns()
    }

    pub fn schema_summary(&self) -> String {
        schema_summary(&self.payload)
    }

    pub fn to_csv(
        &self,
        options: &DelimitedOptions,
        path: Option<&Path>,
    ) -> Result<Option<String>, ExportError> {
        export_delimited(&self.table, options, path)
    }

    pub fn to_json(&self, options: &JsonOptions, path: Option<&Path>) -> Result<Option<String>, ExportError> {
        export_json(&self.table, options, path)
    }

    pub fn to_mapping(&self, orientation: Orientation) -> Value {
        to_mapping(&self.table, orientation)
    }

    pub fn to_frame(&self) -> Frame {
        Frame::from_table(&self.table)
    }

    /// URL of the view's own CSV download on `base_url`, when the page
    /// announced enough to build it.
    pub fn native_csv_url(&self) -> Option<Url> {
        let view_id = self.view_id()?;
        let params = self.page_info.url_with_params.as_deref()?;
        let base = Url::parse(&self.options.fetch.base_url).ok()?;
        let params_url = base.join(params).ok()?;
        let object_params = params_url
            .query_pairs()
            .find(|(key, _)| key == "stringifiedObjectParams")
            .map(|(_, value)| value.into_owned())?;
        let locale = self
            .page_info
            .user_locale
            .as_deref()
            .unwrap_or(&self.options.fetch.user_locale);

        let mut url = base.join(&format!("/v0.3/view/{view_id}/downloadCsv")).ok()?;
        url.query_pairs_mut()
            .append_pair("x-time-zone", &self.options.fetch.time_zone)
            .append_pair("x-user-locale", locale)
            .append_pair("x-airtable-application-id", self.app_id())
            .append_pair("stringifiedObjectParams", &object_params);
        Some(url)
    }

    /// Fetch the CSV the service itself renders for this view. `None` when the
    /// view does not offer it or the service refuses.
    pub fn fetch_native_csv(&self, fetcher: &dyn PageFetcher) -> Result<Option<String>, ScrapeError> {
        let Some(url) = self.native_csv_url() else {
            scrape_debug!("{}: no native CSV download announced", self.url);
            return Ok(None);
        };
        let output = fetcher.fetch(&url, &self.options.fetch.download_headers())?;
        if !output.is_success() {
            scrape_warn!("native CSV download answered HTTP status {}", output.status);
            return Ok(None);
        }
        let decoded = decode_body(&output.bytes, output.metadata.content_type.as_deref())
            .map_err(ExtractionError::from)?;
        Ok(Some(decoded.text))
    }
}

fn parse_url(input: &str) -> Result<Url, MalformedUrlError> {
    Url::parse(input).map_err(|err| MalformedUrlError::Unparsable {
        input: input.to_string(),
        reason: err.to_string(),
    })
}
