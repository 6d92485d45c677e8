//! Target fetching
//!
//! Fetches the raw /jmx servlet dump from a target on every scrape.
//! Loopback targets are fetched anonymously; anything else goes through
//! Kerberos SPNEGO (see [`krb`]).

pub mod krb;

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use crate::error::{ConfigurationError, FetchError};

/// How to authenticate against a remote target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMethod {
    /// Kerberos login with a password
    Password { principal: String, password: String },
    /// Kerberos login with a keytab file
    Keytab { principal: String, keytab: PathBuf },
}

impl AuthMethod {
    /// The full principal (`user@REALM`) this method authenticates as
    pub fn principal(&self) -> &str {
        match self {
            AuthMethod::Password { principal, .. } => principal,
            AuthMethod::Keytab { principal, .. } => principal,
        }
    }
}

/// One scrape target as described by the request parameters
#[derive(Debug, Clone)]
pub struct Target {
    /// Full URL of the JMX servlet, e.g. `http://namenode:50070/jmx`
    pub url: String,
    /// Authentication method for non-loopback targets
    pub auth: Option<AuthMethod>,
}

/// Abstraction over the dump retrieval step
///
/// The scrape handler only depends on this trait, which keeps the
/// network edge swappable in tests.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Fetch the raw JMX dump body from `target`
    async fn fetch(&self, target: &Target) -> Result<Vec<u8>, FetchError>;
}

/// Production fetcher backed by a shared `reqwest` client
pub struct JmxFetcher {
    client: reqwest::Client,
    login_timeout: Duration,
}

impl JmxFetcher {
    /// Create a fetcher with bounded request and login times
    ///
    /// # Errors
    /// Returns an error if the HTTP client fails to initialize
    pub fn new(timeout_ms: u64, login_timeout_ms: u64) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(FetchError::ClientInit)?;

        Ok(Self {
            client,
            login_timeout: Duration::from_millis(login_timeout_ms),
        })
    }
}

#[async_trait]
impl Fetch for JmxFetcher {
    async fn fetch(&self, target: &Target) -> Result<Vec<u8>, FetchError> {
        let host = host_of(&target.url)?;

        if is_loopback_host(&host) {
            debug!(url = %target.url, "Fetching loopback target anonymously");
            let response = self
                .client
                .get(&target.url)
                .send()
                .await
                .map_err(FetchError::Transport)?;
            let body = response.bytes().await.map_err(FetchError::Body)?;
            return Ok(body.to_vec());
        }

        // Remote targets must authenticate. This check runs before any
        // network activity so a misconfigured scrape fails fast.
        let auth = target
            .auth
            .as_ref()
            .ok_or(ConfigurationError::UnsupportedAuthMethod)?;

        krb::spnego_get(&self.client, &target.url, &host, auth, self.login_timeout).await
    }
}

/// Extract the host component of a target URL
fn host_of(url: &str) -> Result<String, FetchError> {
    let parsed = Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;
    parsed
        .host_str()
        .map(str::to_string)
        .ok_or_else(|| FetchError::InvalidUrl(url.to_string()))
}

/// Whether a host names the local machine
///
/// Loopback targets are assumed to be protected by the host boundary and
/// are scraped without authentication.
pub fn is_loopback_host(host: &str) -> bool {
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }
    host.parse::<IpAddr>()
        .map(|ip| ip.is_loopback())
        .unwrap_or(false)
}
