//! Luma event guest list (`/event/get-guests`).

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;

use rollcall_types::Guest;

use crate::{GuestPage, GuestSource, SourceUnavailable};

pub const LUMA_BASE: &str = "https://public-api.luma.com/v1";
const PROVIDER: &str = "luma";

#[derive(Debug, Clone)]
pub struct LumaConfig {
    pub base_url: String,
    pub api_key: String,
    pub page_limit: u32,
    /// Only return guests with this approval status (e.g. `approved`).
    pub approval_status: Option<String>,
}

impl LumaConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: LUMA_BASE.to_string(),
            api_key: api_key.into(),
            page_limit: 100,
            approval_status: None,
        }
    }
}

pub struct LumaSource {
    http: reqwest::Client,
    config: LumaConfig,
    event_api_id: String,
}

impl LumaSource {
    pub fn new(http: reqwest::Client, config: LumaConfig, event_api_id: impl Into<String>) -> Self {
        Self {
            http,
            config,
            event_api_id: event_api_id.into(),
        }
    }

    fn page_url(&self, cursor: Option<&str>) -> Result<Url, SourceUnavailable> {
        let base = self.config.base_url.trim_end_matches('/');
        let mut url = Url::parse(&format!("{}/event/get-guests", base))
            .map_err(|e| SourceUnavailable::other(PROVIDER, format!("bad base url: {}", e)))?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("event_api_id", &self.event_api_id);
            query.append_pair("pagination_limit", &self.config.page_limit.to_string());
            if let Some(status) = &self.config.approval_status {
                query.append_pair("approval_status", status);
            }
            if let Some(cursor) = cursor {
                query.append_pair("pagination_cursor", cursor);
            }
        }

        Ok(url)
    }
}

#[derive(Debug, Deserialize)]
struct LumaPage {
    #[serde(default)]
    entries: Vec<Value>,
    #[serde(default)]
    next_cursor: Option<String>,
    #[serde(default)]
    has_more: Option<bool>,
}

#[async_trait]
impl GuestSource for LumaSource {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    fn describe(&self) -> String {
        self.event_api_id.clone()
    }

    async fn fetch_page(&self, cursor: Option<&str>) -> Result<GuestPage, SourceUnavailable> {
        let url = self.page_url(cursor)?;

        let response = self
            .http
            .get(url)
            .header("accept", "application/json")
            .header("x-luma-api-key", &self.config.api_key)
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

        let page: LumaPage = serde_json::from_str(&body)
            .map_err(|e| SourceUnavailable::other(PROVIDER, format!("undecodable page: {}", e)))?;

        let entries = page
            .entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| map_entry(index, entry))
            .collect();
        let next_cursor = match page.has_more {
            Some(false) => None,
            _ => page.next_cursor,
        };

        Ok(GuestPage { entries, next_cursor })
    }
}

/// Map one `entries[]` item. The guest may be nested under `guest` or flat.
/// Entries without a usable email are skipped. `index` is the entry's
/// position in its page and stands in for a missing id.
pub fn map_entry(index: usize, entry: &Value) -> Option<Guest> {
    let guest = entry.get("guest").filter(|g| g.is_object()).unwrap_or(entry);
    let text = |keys: &[&str]| keys.iter().find_map(|k| guest.get(*k).and_then(Value::as_str));

    let email = text(&["user_email", "email"])?;
    let external_id = text(&["api_id", "id"]).map_or_else(|| index.to_string(), str::to_string);

    let mut mapped = Guest::new(external_id, email)?.with_name(text(&["user_name", "name", "full_name"]));
    mapped.set_attribute("ticket_type", text(&["ticket_type", "ticket_name"]));
    mapped.set_attribute("approval_status", text(&["approval_status"]));
    mapped.set_attribute("checked_in_at", text(&["checked_in_at"]));

    let answers = guest
        .get("registration_answers")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    // The registration form asks for role first, then location.
    let answer_at = |i: usize| answers.get(i).and_then(|a| answer_text(a.get("answer")));
    mapped.set_attribute("role", answer_at(0).as_deref());
    mapped.set_attribute("location", answer_at(1).as_deref());

    for answer in answers {
        if let Some(label) = answer.get("label").and_then(Value::as_str) {
            mapped.set_attribute(label, answer_text(answer.get("answer")).as_deref());
        }
    }

    Some(mapped)
}

fn answer_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(|v| answer_text(Some(v))).collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        _ => None,
    }
}
