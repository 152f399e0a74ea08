use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};

use rollcall_sources::luma::{LumaConfig, LumaSource};
use rollcall_sources::sheets::{SheetsAuth, SheetsConfig, SheetsSource};
use rollcall_sources::{DEFAULT_MAX_PAGES, GuestSource};

/// Operator keys that MUST NOT be used.
const PLACEHOLDER_KEYS: &[&str] = &["change-me", "changeme", "dev-operator-key-change-me"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRef {
    Luma { event_api_id: String },
    Sheets { sheet_id: String, range: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDef {
    pub id: String,
    pub source: SourceRef,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub operator_key: String,
    pub refresh_interval: Duration,
    pub max_pages: usize,
    pub page_limit: u32,
    pub events: Vec<EventDef>,
    pub luma_api_key: Option<String>,
    pub luma_base_url: Option<String>,
    pub luma_approval_status: Option<String>,
    pub sheets_auth: Option<SheetsAuth>,
    pub sheets_base_url: Option<String>,
    pub sheets_email_column: Option<String>,
    pub sheets_name_column: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| var(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let operator_key = var("ROLLCALL_OPERATOR_KEY").unwrap_or_default();
        if operator_key.is_empty() || PLACEHOLDER_KEYS.contains(&operator_key.as_str()) {
            bail!("ROLLCALL_OPERATOR_KEY is unset or still a placeholder");
        }

        let port = var("ROLLCALL_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("ROLLCALL_PORT")?;
        let refresh_secs: u64 = var("ROLLCALL_REFRESH_SECS")
            .unwrap_or_else(|| "10".into())
            .parse()
            .context("ROLLCALL_REFRESH_SECS")?;
        if refresh_secs == 0 {
            bail!("ROLLCALL_REFRESH_SECS must be at least 1");
        }
        let max_pages = match var("ROLLCALL_MAX_PAGES") {
            Some(v) => v.parse().context("ROLLCALL_MAX_PAGES")?,
            None => DEFAULT_MAX_PAGES,
        };
        let page_limit = var("ROLLCALL_PAGE_LIMIT")
            .unwrap_or_else(|| "100".into())
            .parse()
            .context("ROLLCALL_PAGE_LIMIT")?;

        let events = match var("ROLLCALL_EVENTS") {
            Some(raw) => parse_events(&raw)?,
            None => Vec::new(),
        };

        // A bearer token wins over an API key when both are set.
        let sheets_auth = var("GOOGLE_SHEETS_TOKEN")
            .map(SheetsAuth::Bearer)
            .or_else(|| var("GOOGLE_SHEETS_API_KEY").map(SheetsAuth::ApiKey));

        let config = Self {
            host: var("ROLLCALL_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            db_path: var("ROLLCALL_DB_PATH").unwrap_or_else(|| "rollcall.db".into()).into(),
            operator_key,
            refresh_interval: Duration::from_secs(refresh_secs),
            max_pages,
            page_limit,
            events,
            luma_api_key: var("LUMA_API_KEY"),
            luma_base_url: var("LUMA_BASE_URL"),
            luma_approval_status: var("LUMA_APPROVAL_STATUS"),
            sheets_auth,
            sheets_base_url: var("GOOGLE_SHEETS_BASE_URL"),
            sheets_email_column: var("GOOGLE_SHEETS_EMAIL_COLUMN"),
            sheets_name_column: var("GOOGLE_SHEETS_NAME_COLUMN"),
        };
        config.check_credentials()?;
        Ok(config)
    }

    /// Fail at startup rather than on the first refresh.
    fn check_credentials(&self) -> anyhow::Result<()> {
        for event in &self.events {
            match event.source {
                SourceRef::Luma { .. } if self.luma_api_key.is_none() => {
                    bail!("event '{}' reads from Luma but LUMA_API_KEY is unset", event.id)
                }
                SourceRef::Sheets { .. } if self.sheets_auth.is_none() => bail!(
                    "event '{}' reads from Google Sheets but neither GOOGLE_SHEETS_TOKEN nor GOOGLE_SHEETS_API_KEY is set",
                    event.id
                ),
                _ => {}
            }
        }
        Ok(())
    }

    pub fn build_source(&self, source: &SourceRef, http: &reqwest::Client) -> anyhow::Result<Arc<dyn GuestSource>> {
        Ok(match source {
            SourceRef::Luma { event_api_id } => {
                let mut luma = LumaConfig::new(self.luma_api_key.clone().context("LUMA_API_KEY")?);
                if let Some(base) = &self.luma_base_url {
                    luma.base_url = base.clone();
                }
                luma.page_limit = self.page_limit;
                luma.approval_status = self.luma_approval_status.clone();
                Arc::new(LumaSource::new(http.clone(), luma, event_api_id.clone()))
            }
            SourceRef::Sheets { sheet_id, range } => {
                let auth = self.sheets_auth.clone().context("GOOGLE_SHEETS_TOKEN or GOOGLE_SHEETS_API_KEY")?;
                let mut sheets = SheetsConfig::new(auth);
                if let Some(base) = &self.sheets_base_url {
                    sheets.base_url = base.clone();
                }
                if let Some(col) = &self.sheets_email_column {
                    sheets.email_column = col.clone();
                }
                if let Some(col) = &self.sheets_name_column {
                    sheets.name_column = col.clone();
                }
                Arc::new(SheetsSource::new(http.clone(), sheets, sheet_id.clone(), range.clone()))
            }
        })
    }
}

/// Parse `id=luma:<event_api_id>;id2=sheets:<sheet_id>[!<range>]`.
pub fn parse_events(raw: &str) -> anyhow::Result<Vec<EventDef>> {
    let mut events: Vec<EventDef> = Vec::new();

    for entry in raw.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let (id, source) = entry
            .split_once('=')
            .with_context(|| format!("event '{}' is missing '=<provider>:<ref>'", entry))?;
        let (provider, reference) = source
            .split_once(':')
            .with_context(|| format!("event '{}' is missing '<provider>:'", entry))?;
        let (id, provider, reference) = (id.trim(), provider.trim(), reference.trim());

        if id.is_empty() || reference.is_empty() {
            bail!("event '{}' needs both an id and a source reference", entry);
        }
        if events.iter().any(|e| e.id == id) {
            bail!("event '{}' is defined twice", id);
        }

        let source = match provider {
            "luma" => SourceRef::Luma {
                event_api_id: reference.to_string(),
            },
            "sheets" => {
                let (sheet_id, range) = match reference.split_once('!') {
                    Some((sheet, range)) => (sheet, Some(range.to_string()).filter(|r| !r.is_empty())),
                    None => (reference, None),
                };
                SourceRef::Sheets {
                    sheet_id: sheet_id.to_string(),
                    range,
                }
            }
            other => bail!("event '{}' has unknown provider '{}'", id, other),
        };

        events.push(EventDef {
            id: id.to_string(),
            source,
        });
    }

    Ok(events)
}
