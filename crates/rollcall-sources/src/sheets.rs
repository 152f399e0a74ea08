//! Google Sheets form responses (`values.get`), one guest per row.

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;

use rollcall_types::Guest;

use crate::{GuestPage, GuestSource, SourceUnavailable};

pub const SHEETS_BASE: &str = "https://sheets.googleapis.com/v4";
pub const DEFAULT_RANGE: &str = "Form Responses 1";
pub const DEFAULT_EMAIL_COLUMN: &str = "Email Address (Required)";
pub const DEFAULT_NAME_COLUMN: &str = "Full Name (Required)";
const PROVIDER: &str = "sheets";

/// Credentials are obtained out of band; the adapter only attaches them.
#[derive(Debug, Clone)]
pub enum SheetsAuth {
    ApiKey(String),
    Bearer(String),
}

#[derive(Debug, Clone)]
pub struct SheetsConfig {
    pub base_url: String,
    pub auth: SheetsAuth,
    pub email_column: String,
    pub name_column: String,
}

impl SheetsConfig {
    pub fn new(auth: SheetsAuth) -> Self {
        Self {
            base_url: SHEETS_BASE.to_string(),
            auth,
            email_column: DEFAULT_EMAIL_COLUMN.to_string(),
            name_column: DEFAULT_NAME_COLUMN.to_string(),
        }
    }
}

pub struct SheetsSource {
    http: reqwest::Client,
    config: SheetsConfig,
    sheet_id: String,
    range: String,
}

impl SheetsSource {
    pub fn new(
        http: reqwest::Client,
        config: SheetsConfig,
        sheet_id: impl Into<String>,
        range: Option<String>,
    ) -> Self {
        Self {
            http,
            config,
            sheet_id: sheet_id.into(),
            range: range.unwrap_or_else(|| DEFAULT_RANGE.to_string()),
        }
    }

    fn values_url(&self) -> Result<Url, SourceUnavailable> {
        let mut url = Url::parse(&self.config.base_url)
            .map_err(|e| SourceUnavailable::other(PROVIDER, format!("bad base url: {}", e)))?;

        url.path_segments_mut()
            .map_err(|_| SourceUnavailable::other(PROVIDER, "base url cannot have a path"))?
            .pop_if_empty()
            .extend(["spreadsheets", self.sheet_id.as_str(), "values", self.range.as_str()]);

        if let SheetsAuth::ApiKey(key) = &self.config.auth {
            url.query_pairs_mut().append_pair("key", key);
        }

        Ok(url)
    }
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[async_trait]
impl GuestSource for SheetsSource {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    fn describe(&self) -> String {
        format!("{}!{}", self.sheet_id, self.range)
    }

    async fn fetch_page(&self, _cursor: Option<&str>) -> Result<GuestPage, SourceUnavailable> {
        let mut request = self
            .http
            .get(self.values_url()?)
            .header("accept", "application/json");
        if let SheetsAuth::Bearer(token) = &self.config.auth {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SourceUnavailable::other(PROVIDER, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SourceUnavailable::other(PROVIDER, e))?;

        if !status.is_success() {
            return Err(SourceUnavailable::http(PROVIDER, status.as_u16(), &body));
        }

        let range: ValueRange = serde_json::from_str(&body)
            .map_err(|e| SourceUnavailable::other(PROVIDER, format!("undecodable range: {}", e)))?;

        let entries = map_rows(&range.values, &self.config.email_column, &self.config.name_column)?;

        // values.get returns the whole range at once.
        Ok(GuestPage {
            entries,
            next_cursor: None,
        })
    }
}

/// Turn a header row plus data rows into guests.
///
/// The email column is matched by exact header first, then by any header
/// mentioning "email". Every other column becomes an attribute. Guests come
/// back newest response first, so a resubmitted form wins over the older row.
pub fn map_rows(
    rows: &[Vec<Value>],
    email_column: &str,
    name_column: &str,
) -> Result<Vec<Guest>, SourceUnavailable> {
    let Some((header, data)) = rows.split_first() else {
        return Ok(Vec::new());
    };
    let header: Vec<String> = header.iter().map(|h| cell_text(Some(h)).unwrap_or_default()).collect();

    let email_idx = header
        .iter()
        .position(|h| h == email_column)
        .or_else(|| header.iter().position(|h| h.to_lowercase().contains("email")))
        .ok_or_else(|| {
            SourceUnavailable::other(PROVIDER, format!("no email column in header {:?}", header))
        })?;
    let name_idx = header.iter().position(|h| h == name_column);

    let guests = data
        .iter()
        .enumerate()
        .rev()
        .filter_map(|(i, row)| {
            let email = cell_text(row.get(email_idx))?;
            // Row 1 is the header, so data starts at row 2.
            let mut guest = Guest::new((i + 2).to_string(), &email)?
                .with_name(name_idx.and_then(|n| cell_text(row.get(n))).as_deref());

            for (col, title) in header.iter().enumerate() {
                if col == email_idx || Some(col) == name_idx || title.is_empty() {
                    continue;
                }
                guest.set_attribute(title, cell_text(row.get(col)).as_deref());
            }
            Some(guest)
        })
        .collect();

    Ok(guests)
}

fn cell_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
