//! Airtable core: shared-view identifiers, raw payload model, schema resolution,
//! cell coercion, table assembly and the in-memory exporters.
mod coerce;
mod delimited;
mod frame;
mod mapping;
mod payload;
mod schema;
mod share;
mod summary;
mod table;
mod value;

pub use coerce::{coerce_cell, parse_timestamp, CoercionContext, CoercionOptions, PercentScale};
pub use delimited::{parse_delimited, render_cell, to_delimited_string, DelimitedOptions};
pub use frame::{ColumnData, Frame, FrameColumn};
pub use mapping::{from_mapping, to_json_string, to_mapping, JsonOptions, MappingError, Orientation};
pub use payload::{HeaderList, PayloadError, RawColumn, RawPayload, RawRow, UserInfo};
pub use schema::{resolve_column, resolve_columns, resolve_tag, ColumnDescriptor, ResolvedKind};
pub use share::{MalformedUrlError, ShareReference};
pub use summary::{schema_summary, ColumnSummary, JsonKind, SchemaSummary};
pub use table::{assemble, Row, ShapeError, Table};
pub use value::{Attachment, CellValue, Collaborator};
