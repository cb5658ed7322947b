// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use celledit_app::{OptionEntry, PatchPayload, QuerySpec, options_from_json, scalar_text};
use celledit_engine::{OptionQuery, PatchAck, Persistence};
use reqwest::StatusCode;
use reqwest::blocking::Client as HttpClient;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const EDIT_PATH: &str = "inline/edit";
pub const QUERY_PATH: &str = "advance/query";

/// Talks to the server that owns the rows being edited.
#[derive(Debug, Clone)]
pub struct Client {
    base_url: Url,
    timeout: Duration,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let trimmed = base_url.trim();
        if trimmed.is_empty() {
            bail!("server.base_url must not be empty");
        }
        let mut parsed = Url::parse(trimmed)
            .with_context(|| format!("server.base_url {trimmed:?} is not a valid URL"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!(
                "server.base_url {trimmed:?} must use http or https, got {:?}",
                parsed.scheme()
            );
        }
        if !parsed.path().ends_with('/') {
            let path = format!("{}/", parsed.path());
            parsed.set_path(&path);
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url: parsed,
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("build {path} URL from {}", self.base_url))
    }

    /// `PATCH /inline/edit`. Non-2xx answers are errors; a 2xx answer
    /// without a truthy `status` or `success` is a rejection.
    pub fn patch_cell(&self, payload: &PatchPayload) -> Result<PatchAck> {
        let url = self.endpoint(EDIT_PATH)?;
        debug!(
            table = %payload.table,
            field = %payload.field,
            row = %payload.id,
            "sending inline edit"
        );
        let response = self
            .http
            .patch(url)
            .json(payload)
            .send()
            .map_err(|error| connection_error(self.base_url.as_str(), error))?;

        let status = response.status();
        let body = response.text().unwrap_or_default();
        if !status.is_success() {
            return Err(clean_error_response(status, &body));
        }
        Ok(parse_ack(&body))
    }

    /// `POST /advance/query`, returning the `data` rows as options.
    pub fn advance_query(&self, spec: &QuerySpec) -> Result<Vec<OptionEntry>> {
        let url = self.endpoint(QUERY_PATH)?;
        let request = QueryRequest {
            key: &spec.key,
            qry: &spec.qry,
            values: &spec.values,
        };
        let response = self
            .http
            .post(url)
            .json(&request)
            .send()
            .map_err(|error| connection_error(self.base_url.as_str(), error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }

        let parsed: Value = response.json().context("decode query response")?;
        let data = parsed
            .get("data")
            .ok_or_else(|| anyhow!("query response for {:?} has no `data` field", spec.key))?;
        let options = options_from_json(data).ok_or_else(|| {
            anyhow!(
                "query response for {:?} has a `data` field that is neither a list nor a map",
                spec.key
            )
        })?;
        debug!(column = %spec.key, count = options.len(), "query answered");
        Ok(options)
    }
}

impl Persistence for Client {
    fn patch(&self, payload: &PatchPayload) -> Result<PatchAck> {
        self.patch_cell(payload)
    }
}

impl OptionQuery for Client {
    fn query(&self, spec: &QuerySpec) -> Result<Vec<OptionEntry>> {
        self.advance_query(spec)
    }
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    key: &'a str,
    qry: &'a str,
    values: &'a [String],
}

fn parse_ack(body: &str) -> PatchAck {
    let Ok(parsed) = serde_json::from_str::<Value>(body) else {
        return PatchAck::rejected("server did not confirm the change");
    };
    let confirmed = ["status", "success"]
        .iter()
        .any(|field| parsed.get(field).is_some_and(is_truthy));
    if confirmed {
        return PatchAck::ok();
    }
    match message_of(&parsed) {
        Some(message) => PatchAck::rejected(message),
        None => PatchAck::rejected("server did not confirm the change"),
    }
}

fn message_of(parsed: &Value) -> Option<String> {
    ["message", "msg", "error"]
        .iter()
        .filter_map(|field| parsed.get(field))
        .map(scalar_text)
        .find(|message| !message.trim().is_empty())
}

/// Loose truthiness as a browser would judge a JSON field.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn connection_error(base_url: &str, error: reqwest::Error) -> anyhow::Error {
    anyhow!(
        "cannot reach {} -- check server.base_url and that the server is running ({})",
        base_url,
        error
    )
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if let Ok(parsed) = serde_json::from_str::<Value>(body)
        && let Some(message) = message_of(&parsed)
    {
        return anyhow!("server error ({}): {}", status.as_u16(), message);
    }

    if !body.is_empty() && body.len() < 100 && !body.contains('{') {
        return anyhow!("server error ({}): {}", status.as_u16(), body.trim());
    }

    anyhow!("server returned {}", status.as_u16())
}

#[cfg(test)]
mod tests {
    use super::{Client, clean_error_response, is_truthy, parse_ack};
    use reqwest::StatusCode;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn truthiness_matches_loose_json_rules() {
        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!(1)));
        assert!(is_truthy(&json!("ok")));
        assert!(is_truthy(&json!({})));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(false)));
    }

    #[test]
    fn ack_reads_status_or_success() {
        assert!(parse_ack(r#"{"status":1}"#).success);
        assert!(parse_ack(r#"{"success":true,"message":"saved"}"#).success);

        let rejected = parse_ack(r#"{"status":false,"message":"row is locked"}"#);
        assert!(!rejected.success);
        assert_eq!(rejected.message.as_deref(), Some("row is locked"));

        let bare = parse_ack("");
        assert!(!bare.success);
        assert_eq!(
            bare.message.as_deref(),
            Some("server did not confirm the change")
        );
    }

    #[test]
    fn error_response_prefers_json_message() {
        let error = clean_error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"error":"column notes is read-only"}"#,
        );
        assert_eq!(
            error.to_string(),
            "server error (422): column notes is read-only"
        );
        let plain = clean_error_response(StatusCode::BAD_GATEWAY, "upstream down\n");
        assert_eq!(plain.to_string(), "server error (502): upstream down");
        let opaque = clean_error_response(StatusCode::INTERNAL_SERVER_ERROR, "");
        assert_eq!(opaque.to_string(), "server returned 500");
    }

    #[test]
    fn base_url_must_be_http() {
        assert!(Client::new("", Duration::from_secs(1)).is_err());
        assert!(Client::new("ftp://example.com", Duration::from_secs(1)).is_err());
        let client = Client::new("http://localhost:8080/app", Duration::from_secs(1))
            .expect("valid base url");
        assert_eq!(client.base_url(), "http://localhost:8080/app/");
    }
}
