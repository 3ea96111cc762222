//! InfluxDB 1.x sink over the HTTP API
//!
//! ## Endpoints
//!
//! - `POST /query?q=CREATE DATABASE ...` - database creation
//! - `GET /query?db=..&q=..` - read queries (JSON results)
//! - `POST /write?db=..&precision=u` - line protocol writes
//! - `GET /ping` - reachability
//!
//! Query results are canonicalized into the [`COLUMNS`](super::schema::COLUMNS)
//! layout before they leave this module.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use tracing::{debug, instrument, trace};

use super::backend::{FieldValue, MetricSink, Point, SampleQuery};
use super::error::{SinkError, SinkResult};
use super::schema::{QueryResponse, Series};

#[derive(Debug, Deserialize)]
struct InfluxResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatementResult {
    #[serde(default)]
    series: Vec<Series>,
    error: Option<String>,
}

/// InfluxDB HTTP sink
#[derive(Debug, Clone)]
pub struct InfluxSink {
    client: Client,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
}

impl InfluxSink {
    pub fn new(
        url: &str,
        username: Option<String>,
        password: Option<String>,
        skip_tls_verify: bool,
        timeout: Duration,
    ) -> SinkResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(skip_tls_verify)
            .build()
            .map_err(|e| SinkError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
            username,
            password,
        })
    }

    fn authenticated(&self, request: RequestBuilder) -> RequestBuilder {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => request.query(&[("u", user), ("p", pass)]),
            (Some(user), None) => request.query(&[("u", user)]),
            _ => request,
        }
    }

    async fn execute(&self, request: RequestBuilder) -> SinkResult<InfluxResponse> {
        let response = self.authenticated(request).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(SinkError::QueryFailed(format!("HTTP {status}: {body}")));
        }

        let parsed: InfluxResponse = serde_json::from_str(&body)
            .map_err(|e| SinkError::InvalidResponse(format!("{e}: {body}")))?;

        if let Some(error) = &parsed.error {
            return Err(SinkError::QueryFailed(error.clone()));
        }

        Ok(parsed)
    }
}

#[async_trait]
impl MetricSink for InfluxSink {
    #[instrument(skip(self))]
    async fn create_database(&self, name: &str) -> SinkResult<()> {
        debug!("creating database {name}");

        let statement = format!("CREATE DATABASE \"{}\"", escape_identifier(name));
        let request = self
            .client
            .post(format!("{}/query", self.base_url))
            .query(&[("q", statement)]);

        let response = self.execute(request).await?;
        match response.results.into_iter().find_map(|r| r.error) {
            Some(error) if error.contains("already exists") => Ok(()),
            Some(error) => Err(SinkError::QueryFailed(error)),
            None => Ok(()),
        }
    }

    async fn write(&self, database: &str, points: Vec<Point>) -> SinkResult<()> {
        let body = points
            .iter()
            .map(line_protocol)
            .collect::<Vec<_>>()
            .join("\n");
        trace!("writing {} points to {database}", points.len());

        let request = self
            .client
            .post(format!("{}/write", self.base_url))
            .query(&[("db", database), ("precision", "u")])
            .body(body);

        let response = self
            .authenticated(request)
            .send()
            .await
            .map_err(|e| SinkError::WriteFailed(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let text = response.text().await.unwrap_or_default();
            Err(SinkError::WriteFailed(format!("HTTP {status}: {text}")))
        }
    }

    async fn query(&self, database: &str, query: &SampleQuery) -> SinkResult<QueryResponse> {
        let statement = query.statement();
        trace!("querying {database}: {statement}");

        let request = self
            .client
            .get(format!("{}/query", self.base_url))
            .query(&[("db", database), ("q", statement.as_str())]);

        let response = self.execute(request).await?;
        let Some(result) = response.results.into_iter().next() else {
            return Ok(QueryResponse::default());
        };

        if let Some(error) = result.error {
            return Err(SinkError::QueryFailed(error));
        }

        Ok(QueryResponse {
            series: result.series.into_iter().map(Series::canonicalize).collect(),
        })
    }

    async fn ping(&self) -> SinkResult<()> {
        let response = self
            .client
            .get(format!("{}/ping", self.base_url))
            .send()
            .await
            .map_err(|e| SinkError::ConnectionFailed(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(SinkError::ConnectionFailed(format!(
                "ping returned HTTP {}",
                response.status()
            )))
        }
    }
}

fn escape_identifier(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn escape_key(value: &str) -> String {
    value
        .replace(',', "\\,")
        .replace('=', "\\=")
        .replace(' ', "\\ ")
}

fn escape_measurement(value: &str) -> String {
    value.replace(',', "\\,").replace(' ', "\\ ")
}

fn field_literal(value: &FieldValue) -> String {
    match value {
        FieldValue::String(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
        FieldValue::Integer(i) => format!("{i}i"),
        FieldValue::Float(f) => f.to_string(),
        FieldValue::Boolean(b) => b.to_string(),
    }
}

/// Encode a point as one line of InfluxDB line protocol (microsecond precision).
pub fn line_protocol(point: &Point) -> String {
    let mut line = escape_measurement(&point.measurement);

    for (key, value) in &point.tags {
        // empty tag values are rejected by the server
        if value.is_empty() {
            continue;
        }
        line.push(',');
        line.push_str(&escape_key(key));
        line.push('=');
        line.push_str(&escape_key(value));
    }

    let fields = point
        .fields
        .iter()
        .map(|(key, value)| format!("{}={}", escape_key(key), field_literal(value)))
        .collect::<Vec<_>>()
        .join(",");

    format!("{line} {fields} {}", point.timestamp.timestamp_micros())
}
