use url::Url;

const APP_PREFIX: &str = "app";
const SHARE_PREFIX: &str = "shr";
const TABLE_PREFIX: &str = "tbl";
const VIEW_PREFIX: &str = "viw";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedUrlError {
    #[error("not a valid url {input:?}: {reason}")]
    Unparsable { input: String, reason: String },
    #[error("unsupported scheme {scheme:?} in {input:?}")]
    UnsupportedScheme { input: String, scheme: String },
    #[error("expected a shared view path /<appId>/<shrId> in {input:?}")]
    UnexpectedPath { input: String },
    #[error("invalid {expected} identifier {value:?}")]
    InvalidIdentifier {
        expected: &'static str,
        value: String,
    },
}

/// Identifiers of one publicly shared view.
///
/// `app_id` and `share_id` are always present; `table_id` and `view_id` are
/// filled from the URL when it carries them, otherwise from the fetched payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShareReference {
    app_id: String,
    share_id: String,
    view_id: Option<String>,
    table_id: Option<String>,
}

impl ShareReference {
    /// Parse a shared-view URL such as `https://airtable.com/appXXXX/shrYYYY`.
    ///
    /// An optional leading `embed` segment is skipped and trailing `tbl…` /
    /// `viw…` segments are captured. Query and fragment are ignored.
    pub fn parse(input: &str) -> Result<Self, MalformedUrlError> {
        let trimmed = input.trim();
        let url = Url::parse(trimmed).map_err(|err| MalformedUrlError::Unparsable {
            input: trimmed.to_string(),
            reason: err.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(MalformedUrlError::UnsupportedScheme {
                input: trimmed.to_string(),
                scheme: url.scheme().to_string(),
            });
        }

        let segments: Vec<&str> = url
            .path_segments()
            .map(|parts| parts.filter(|p| !p.is_empty()).collect())
            .unwrap_or_default();
        let mut rest = segments.as_slice();
        if rest.first().is_some_and(|s| s.eq_ignore_ascii_case("embed")) {
            rest = &rest[1..];
        }

        let (app, share, tail) = match rest {
            [app, share, tail @ ..] if app.starts_with(APP_PREFIX) && share.starts_with(SHARE_PREFIX) => {
                (*app, *share, tail)
            }
            _ => {
                return Err(MalformedUrlError::UnexpectedPath {
                    input: trimmed.to_string(),
                })
            }
        };

        let mut reference = Self::from_ids(app, share)?;
        for segment in tail {
            if reference.table_id.is_none() && is_identifier(segment, TABLE_PREFIX) {
                reference.table_id = Some(segment.to_string());
            } else if reference.view_id.is_none() && is_identifier(segment, VIEW_PREFIX) {
                reference.view_id = Some(segment.to_string());
            }
        }
        Ok(reference)
    }

    /// Build a reference from an explicit identifier pair.
    pub fn from_ids(app_id: &str, share_id: &str) -> Result<Self, MalformedUrlError> {
        let app_id = validate(app_id, APP_PREFIX, "app")?;
        let share_id = validate(share_id, SHARE_PREFIX, "share")?;
        Ok(Self {
            app_id,
            share_id,
            view_id: None,
            table_id: None,
        })
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn share_id(&self) -> &str {
        &self.share_id
    }

    pub fn view_id(&self) -> Option<&str> {
        self.view_id.as_deref()
    }

    pub fn table_id(&self) -> Option<&str> {
        self.table_id.as_deref()
    }

    /// Copy of this reference with absent table/view ids filled in.
    /// Ids already known from the URL win over the resolved ones.
    pub fn resolved(&self, table_id: Option<&str>, view_id: Option<&str>) -> Self {
        let mut next = self.clone();
        if next.table_id.is_none() {
            next.table_id = table_id.map(str::to_string);
        }
        if next.view_id.is_none() {
            next.view_id = view_id.map(str::to_string);
        }
        next
    }

    /// Canonical shared-view page URL on `base` (scheme, host and port are kept).
    pub fn page_url(&self, base: &Url) -> Url {
        let mut url = base.clone();
        url.set_path(&format!("/{}/{}", self.app_id, self.share_id));
        url.set_query(None);
        url.set_fragment(None);
        url
    }
}

fn validate(value: &str, prefix: &str, expected: &'static str) -> Result<String, MalformedUrlError> {
    let value = value.trim();
    if is_identifier(value, prefix) {
        Ok(value.to_string())
    } else {
        Err(MalformedUrlError::InvalidIdentifier {
            expected,
            value: value.to_string(),
        })
    }
}

fn is_identifier(value: &str, prefix: &str) -> bool {
    match value.strip_prefix(prefix) {
        Some(body) => !body.is_empty() && body.chars().all(|c| c.is_ascii_alphanumeric()),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::is_identifier;

    #[test]
    fn identifier_needs_prefix_and_alphanumeric_body() {
        assert!(is_identifier("appAbc123", "app"));
        assert!(!is_identifier("app", "app"));
        assert!(!is_identifier("appAb-c", "app"));
        assert!(!is_identifier("shrAbc", "app"));
    }
}
