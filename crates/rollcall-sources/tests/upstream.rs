/// Adapters against fake upstream servers on loopback.

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::{
    Json, Router,
    extract::{Path, Query},
    http::{HeaderMap, StatusCode},
    routing::get,
};
use serde_json::{Value, json};

use rollcall_sources::luma::{LumaConfig, LumaSource};
use rollcall_sources::sheets::{SheetsAuth, SheetsConfig, SheetsSource};
use rollcall_sources::{GuestSource, fetch_all_guests};

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn fake_luma_guests(
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, (StatusCode, String)> {
    if headers.get("x-luma-api-key").and_then(|v| v.to_str().ok()) != Some("secret") {
        return Err((StatusCode::UNAUTHORIZED, "bad api key".into()));
    }
    if params.get("event_api_id").map(String::as_str) != Some("evt-1") {
        return Err((StatusCode::NOT_FOUND, "no such event".into()));
    }

    let page = match params.get("pagination_cursor").map(String::as_str) {
        None => json!({
            "entries": [
                { "api_id": "g1", "guest": { "api_id": "g1", "user_email": "a@x.com", "user_name": "Ada" } },
                { "api_id": "g2", "guest": { "api_id": "g2", "user_email": "B@X.com" } }
            ],
            "has_more": true,
            "next_cursor": "page-2"
        }),
        Some("page-2") => json!({
            "entries": [
                { "api_id": "g3", "guest": { "api_id": "g3", "user_email": "c@x.com", "registration_answers": null } }
            ],
            "has_more": false,
            "next_cursor": "ignored-when-has-more-is-false"
        }),
        Some(other) => return Err((StatusCode::BAD_REQUEST, format!("unknown cursor {}", other))),
    };
    Ok(Json(page))
}

fn luma(base: &str, key: &str) -> LumaSource {
    let mut config = LumaConfig::new(key);
    config.base_url = format!("{}/v1", base);
    LumaSource::new(reqwest::Client::new(), config, "evt-1")
}

#[tokio::test]
async fn luma_walks_all_pages() {
    let base = serve(Router::new().route("/v1/event/get-guests", get(fake_luma_guests))).await;

    let fetched = fetch_all_guests(&luma(&base, "secret"), 100).await.unwrap();

    let emails: Vec<_> = fetched.guests.iter().map(|g| g.email.as_str()).collect();
    assert_eq!(emails, vec!["a@x.com", "b@x.com", "c@x.com"]);
    assert_eq!(fetched.pages, 2);
    assert!(!fetched.truncated);
}

#[tokio::test]
async fn luma_error_status_surfaces_with_body() {
    let base = serve(Router::new().route("/v1/event/get-guests", get(fake_luma_guests))).await;

    let err = fetch_all_guests(&luma(&base, "wrong"), 100).await.unwrap_err();

    assert_eq!(err.provider, "luma");
    assert_eq!(err.status, Some(401));
    assert!(err.detail.contains("bad api key"));
}

#[tokio::test]
async fn luma_garbage_body_is_unavailable() {
    let base = serve(Router::new().route("/v1/event/get-guests", get(|| async { "<html>oops</html>" }))).await;

    let err = luma(&base, "secret").fetch_page(None).await.unwrap_err();

    assert_eq!(err.status, None);
    assert!(err.detail.contains("undecodable"));
}

#[tokio::test]
async fn unreachable_upstream_is_unavailable() {
    // Bind then drop to get a port nobody listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = luma(&format!("http://{}", addr), "secret").fetch_page(None).await.unwrap_err();

    assert_eq!(err.provider, "luma");
    assert_eq!(err.status, None);
}

async fn fake_sheet_values(
    Path((sheet_id, range)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    let key_ok = params.get("key").map(String::as_str) == Some("k1");
    let bearer_ok = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        == Some("Bearer t1");
    if !key_ok && !bearer_ok {
        return Err(StatusCode::FORBIDDEN);
    }
    if sheet_id != "sheet-1" || range != "Form Responses 1" {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(json!({
        "range": "'Form Responses 1'!A1:D3",
        "majorDimension": "ROWS",
        "values": [
            ["Timestamp", "Full Name (Required)", "Email Address (Required)", "Current Role (Multiple choice)"],
            ["1/1/2025 9:00:00", "Ada", "ada@x.com", "Builder"],
            ["1/1/2025 9:01:00", "Bob", "bob@x.com"]
        ]
    })))
}

fn sheets(base: &str, auth: SheetsAuth) -> SheetsSource {
    let mut config = SheetsConfig::new(auth);
    config.base_url = format!("{}/v4", base);
    SheetsSource::new(reqwest::Client::new(), config, "sheet-1", None)
}

#[tokio::test]
async fn sheets_reads_rows_with_api_key_or_bearer() {
    let base = serve(Router::new().route(
        "/v4/spreadsheets/{sheet_id}/values/{range}",
        get(fake_sheet_values),
    ))
    .await;

    for auth in [SheetsAuth::ApiKey("k1".into()), SheetsAuth::Bearer("t1".into())] {
        let fetched = fetch_all_guests(&sheets(&base, auth), 100).await.unwrap();
        assert_eq!(fetched.pages, 1);
        assert_eq!(fetched.guests.len(), 2);
        assert_eq!(fetched.guests[0].email, "bob@x.com");
        assert_eq!(fetched.guests[0].attribute("Current Role (Multiple choice)"), "unknown");
        assert_eq!(fetched.guests[1].email, "ada@x.com");
    }
}

#[tokio::test]
async fn sheets_permission_denied_is_unavailable() {
    let base = serve(Router::new().route(
        "/v4/spreadsheets/{sheet_id}/values/{range}",
        get(fake_sheet_values),
    ))
    .await;

    let err = fetch_all_guests(&sheets(&base, SheetsAuth::ApiKey("nope".into())), 100)
        .await
        .unwrap_err();

    assert_eq!(err.provider, "sheets");
    assert_eq!(err.status, Some(403));
}
