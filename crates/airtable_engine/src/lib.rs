//! Airtable engine: fetching shared-view pages, locating their table data,
//! the scraping session and file exports.
mod decode;
mod export;
mod fetch;
mod locate;
mod persist;
mod session;
mod types;

pub use decode::{decode_body, DecodeError, DecodedBody};
pub use export::{export_delimited, export_json, ExportError};
pub use fetch::{
    FetchSettings, PageFetcher, ReqwestFetcher, DEFAULT_BASE_URL, DEFAULT_TIME_ZONE,
    DEFAULT_USER_AGENT,
};
pub use locate::{
    read_endpoint_reply, ExtractionError, LocatedPayload, PageInfo, PayloadLocator,
    SharedViewLocator,
};
pub use persist::{ensure_parent_dir, write_atomic, PersistError};
pub use session::{ScrapeError, SessionOptions, SharedView};
pub use types::{FailureKind, FetchError, FetchMetadata, FetchOutput};
