use std::io::{self, Read};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use airtable_core::HeaderList;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use scrape_logging::{scrape_debug, scrape_info, scrape_trace, scrape_warn};
use url::Url;

use crate::{FailureKind, FetchError, FetchMetadata, FetchOutput};

pub const DEFAULT_BASE_URL: &str = "https://airtable.com";
pub const DEFAULT_TIME_ZONE: &str = "America/New_York";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Origin used for pages opened from explicit ids and for the data endpoint.
    pub base_url: String,
    pub user_agent: String,
    pub accept_language: String,
    /// Sent as `x-time-zone` to the data endpoint.
    pub time_zone: String,
    /// Locale used when the page does not announce one.
    pub user_locale: String,
    /// Appended to every request, overriding defaults of the same name.
    pub extra_headers: HeaderList,
    /// `None` means no timeout at all.
    pub connect_timeout: Option<Duration>,
    pub request_timeout: Option<Duration>,
    pub redirect_limit: usize,
    pub max_bytes: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_language: "en-ZA,en;q=0.9".to_string(),
            time_zone: DEFAULT_TIME_ZONE.to_string(),
            user_locale: "en".to_string(),
            extra_headers: Vec::new(),
            connect_timeout: None,
            request_timeout: None,
            redirect_limit: 5,
            max_bytes: 64 * 1024 * 1024,
        }
    }
}

impl FetchSettings {
    /// Browser-like headers for the shared-view page.
    pub fn page_headers(&self) -> HeaderList {
        let mut headers = vec![
            ("Accept".to_string(), "*/*".to_string()),
            ("Accept-Language".to_string(), self.accept_language.clone()),
            ("Cache-Control".to_string(), "no-cache".to_string()),
            ("Pragma".to_string(), "no-cache".to_string()),
            ("User-Agent".to_string(), self.user_agent.clone()),
        ];
        merge_headers(&mut headers, &self.extra_headers);
        headers
    }

    /// Headers for the data endpoint: page defaults, fetch-mode hints, the
    /// time zone, then whatever the page announced.
    pub fn endpoint_headers(&self, announced: &[(String, String)]) -> HeaderList {
        let mut headers = self.page_headers();
        let hints = [
            ("Sec-Fetch-Dest", "empty"),
            ("Sec-Fetch-Mode", "cors"),
            ("Sec-Fetch-Site", "same-origin"),
        ];
        let hints: HeaderList = hints
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .chain(std::iter::once(("x-time-zone".to_string(), self.time_zone.clone())))
            .collect();
        merge_headers(&mut headers, &hints);
        merge_headers(&mut headers, announced);
        merge_headers(&mut headers, &self.extra_headers);
        headers
    }

    /// Headers for the view's own CSV download.
    pub fn download_headers(&self) -> HeaderList {
        let mut headers = vec![
            ("Accept".to_string(), "text/csv,text/html".to_string()),
            ("Accept-Language".to_string(), "en".to_string()),
            ("User-Agent".to_string(), self.user_agent.clone()),
        ];
        merge_headers(&mut headers, &self.extra_headers);
        headers
    }
}

/// Set each header of `extra` on `headers`, replacing names case-insensitively.
pub(crate) fn merge_headers(headers: &mut HeaderList, extra: &[(String, String)]) {
    for (name, value) in extra {
        match headers.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
            Some(existing) => existing.1 = value.clone(),
            None => headers.push((name.clone(), value.clone())),
        }
    }
}

/// Issues one GET and hands back whatever came back.
pub trait PageFetcher: Send + Sync {
    fn fetch(&self, url: &Url, headers: &[(String, String)]) -> Result<FetchOutput, FetchError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    settings: FetchSettings,
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    fn build_client(
        &self,
        redirect_counter: Arc<AtomicUsize>,
    ) -> Result<reqwest::blocking::Client, FetchError> {
        let redirect_limit = self.settings.redirect_limit;
        let policy = reqwest::redirect::Policy::custom(move |attempt| {
            // `previous` holds the original URL too, so its length is the
            // number of redirects this hop would make.
            let count = attempt.previous().len();
            if count > redirect_limit {
                attempt.error("redirect limit exceeded")
            } else {
                redirect_counter.store(count, Ordering::Relaxed);
                attempt.follow()
            }
        });

        reqwest::blocking::Client::builder()
            .connect_timeout(self.settings.connect_timeout)
            .timeout(self.settings.request_timeout)
            .redirect(policy)
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))
    }
}

impl PageFetcher for ReqwestFetcher {
    fn fetch(&self, url: &Url, headers: &[(String, String)]) -> Result<FetchOutput, FetchError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::new(
                FailureKind::InvalidUrl,
                format!("unsupported scheme {}", url.scheme()),
            ));
        }
        let redirect_counter = Arc::new(AtomicUsize::new(0));
        let client = self.build_client(redirect_counter.clone())?;

        scrape_debug!("GET {url}");
        scrape_trace!(
            "request headers: {:?}",
            headers.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>()
        );
        let response = client
            .get(url.clone())
            .headers(header_map(headers))
            .send()
            .map_err(map_reqwest_error)?;

        let max_bytes = self.settings.max_bytes;
        if let Some(content_len) = response.content_length() {
            if content_len > max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes,
                        actual: Some(content_len),
                    },
                    "response too large",
                ));
            }
        }

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let response_headers: HeaderList = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let mut bytes = Vec::new();
        response
            .take(max_bytes.saturating_add(1))
            .read_to_end(&mut bytes)
            .map_err(map_io_error)?;
        if bytes.len() as u64 > max_bytes {
            return Err(FetchError::new(
                FailureKind::TooLarge {
                    max_bytes,
                    actual: None,
                },
                "response too large",
            ));
        }

        scrape_info!("fetched {final_url}: status {status}, {} bytes", bytes.len());
        let metadata = FetchMetadata {
            original_url: url.to_string(),
            final_url,
            redirect_count: redirect_counter.load(Ordering::Relaxed),
            content_type,
            byte_len: bytes.len() as u64,
        };

        Ok(FetchOutput {
            status,
            headers: response_headers,
            bytes,
            metadata,
        })
    }
}

fn header_map(headers: &[(String, String)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                map.insert(name, value);
            }
            _ => scrape_warn!("skipping header {name:?} that cannot be sent"),
        }
    }
    map
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_redirect() {
        return FetchError::new(FailureKind::RedirectLimitExceeded, err.to_string());
    }
    if err.is_builder() {
        return FetchError::new(FailureKind::InvalidUrl, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}

fn map_io_error(err: io::Error) -> FetchError {
    if err.kind() == io::ErrorKind::TimedOut {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}
