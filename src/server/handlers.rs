//! HTTP request handlers
//!
//! The scrape handler drives the whole pipeline: parameter parsing,
//! dump fetch, service resolution, metric mapping and text encoding.
//! Everything after parameter validation degrades to a well-formed
//! response with `hadoop_jmx_export_success 0` so one broken target
//! never breaks the Prometheus job scraping it.

use std::borrow::Cow;
use std::time::{Duration, Instant};

use axum::{
    extract::{RawQuery, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use percent_encoding::percent_decode_str;
use prometheus::{Encoder, Gauge, Opts, Registry, TextEncoder};
use tracing::{info, instrument, warn};

use super::AppState;
use crate::collector::{self, BeanDocument};
use crate::error::ScrapeError;
use crate::fetcher::{AuthMethod, Fetch, Target};
use crate::resolver;

/// Root endpoint - displays basic info
pub async fn root(State(state): State<AppState>) -> Html<String> {
    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>hadoop-jmx-exporter</title>
</head>
<body>
    <h1>hadoop-jmx-exporter</h1>
    <p>Version: {}</p>
    <ul>
        <li><a href="{}?target=http://localhost:50070/jmx">Scrape local NameNode</a></li>
    </ul>
</body>
</html>"#,
        env!("CARGO_PKG_VERSION"),
        state.config.server.path
    );
    Html(html)
}

/// Parameters accepted by the scrape endpoint
#[derive(Debug, Default, PartialEq)]
struct ScrapeParams {
    target: Option<String>,
    principal: Option<String>,
    password: Option<String>,
    ktpath: Option<String>,
}

/// Rejection for a `target` value that is not valid percent-encoding
#[derive(Debug)]
struct MalformedTarget;

/// Strictly decode one form-urlencoded query component
///
/// The lossy decoder passes bad `%` escapes through verbatim and
/// substitutes invalid UTF-8; both cases are rejected here instead.
fn decode_component(raw: &str) -> Option<String> {
    let bytes = raw.as_bytes();
    let mut index = 0;
    while let Some(offset) = bytes[index..].iter().position(|&b| b == b'%') {
        let escape = bytes.get(index + offset + 1..index + offset + 3)?;
        if !escape.iter().all(u8::is_ascii_hexdigit) {
            return None;
        }
        index += offset + 3;
    }

    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .ok()
        .map(Cow::into_owned)
}

impl ScrapeParams {
    /// Parse the raw query string
    ///
    /// The `target` value must decode strictly; the auth parameters
    /// degrade gracefully, an undecodable value is logged and left
    /// unset so the fetcher rejects the scrape later if it mattered.
    fn parse(raw: &str) -> Result<Self, MalformedTarget> {
        let mut params = Self::default();
        for pair in raw.split('&').filter(|pair| !pair.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            if !matches!(key, "target" | "principal" | "password" | "ktpath") {
                continue;
            }

            let Some(decoded) = decode_component(value) else {
                if key == "target" {
                    return Err(MalformedTarget);
                }
                warn!(
                    parameter = key,
                    "Dropping scrape parameter with invalid percent-encoding"
                );
                continue;
            };
            match key {
                "target" => params.target = Some(decoded),
                "principal" => params.principal = Some(decoded),
                "password" => params.password = Some(decoded),
                "ktpath" => params.ktpath = Some(decoded),
                _ => {}
            }
        }
        Ok(params)
    }

    /// Pick the authentication method from the given parameters
    ///
    /// A keytab wins over a password when both are present. A principal
    /// alone selects nothing; the fetcher rejects remote targets later.
    fn auth(self) -> Option<AuthMethod> {
        let principal = self.principal?;
        if let Some(ktpath) = self.ktpath {
            return Some(AuthMethod::Keytab {
                principal,
                keytab: ktpath.into(),
            });
        }
        self.password
            .map(|password| AuthMethod::Password { principal, password })
    }
}

/// Scrape endpoint - fetches one target's JMX dump and maps it
#[instrument(skip_all, name = "scrape_handler")]
pub async fn scrape(State(state): State<AppState>, RawQuery(query): RawQuery) -> Response {
    // The only hard request errors: without a decodable target there
    // is nothing to report metrics about.
    let params = match ScrapeParams::parse(query.as_deref().unwrap_or("")) {
        Ok(params) => params,
        Err(MalformedTarget) => {
            return (
                StatusCode::BAD_REQUEST,
                "'target' parameter is not valid percent-encoding",
            )
                .into_response()
        }
    };

    let Some(url) = params.target.clone() else {
        return (StatusCode::BAD_REQUEST, "'target' parameter is missing").into_response();
    };

    let target = Target {
        url,
        auth: params.auth(),
    };

    match run_scrape(state.fetcher.as_ref(), &target).await {
        Ok(body) => (
            StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                TextEncoder::new().format_type().to_string(),
            )],
            body,
        )
            .into_response(),
        Err(e) => {
            // Registry assembly itself failed; nothing sensible to expose.
            warn!(target = %target.url, error = %e, "Failed to assemble scrape response");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to assemble metrics").into_response()
        }
    }
}

/// Run one scrape against a fresh registry and encode the result
async fn run_scrape(fetcher: &dyn Fetch, target: &Target) -> Result<String, prometheus::Error> {
    let registry = Registry::new();

    let export_success = Gauge::with_opts(Opts::new(
        "hadoop_jmx_export_success",
        "Whether the scrape of the target succeeded",
    ))?;
    registry.register(Box::new(export_success.clone()))?;

    match collect_target(fetcher, target, &registry).await {
        Ok(duration) => {
            export_success.set(1.0);

            // Registered only when a mapping actually ran, so failed
            // scrapes carry no stale duration sample.
            let export_duration = Gauge::with_opts(Opts::new(
                "hadoop_jmx_export_duration_seconds",
                "Wall-clock time spent mapping the dump into metrics",
            ))?;
            export_duration.set(duration.as_secs_f64());
            registry.register(Box::new(export_duration))?;
        }
        Err(e) => {
            warn!(target = %target.url, error = %e, "Scrape failed");
            export_success.set(0.0);
        }
    }

    encode(&registry)
}

/// Fetch, resolve and map one target
///
/// Returns the wall-clock duration of the mapping invocation.
async fn collect_target(
    fetcher: &dyn Fetch,
    target: &Target,
    registry: &Registry,
) -> Result<Duration, ScrapeError> {
    let raw = fetcher.fetch(target).await?;
    let document = BeanDocument::parse(&raw)?;

    let kind = resolver::resolve(&document)?.ok_or(ScrapeError::UnknownService)?;
    let mapping = collector::lookup(kind).ok_or(ScrapeError::UnknownService)?;
    info!(target = %target.url, service = kind.as_str(), "Mapping JMX dump");

    let start = Instant::now();
    mapping.populate(&document, registry)?;
    Ok(start.elapsed())
}

/// Serialize a registry in Prometheus text exposition format
fn encode(registry: &Registry) -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
