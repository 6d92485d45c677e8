//! Kerberos SPNEGO authentication
//!
//! Builds the `Authorization: Negotiate <token>` header for remote JMX
//! servlets protected by Hadoop's SPNEGO filter. The GSSAPI backend is
//! compiled in only with the `kerberos` cargo feature; without it, any
//! Kerberos fetch fails at the login stage with a descriptive error.

use std::time::Duration;

use tracing::debug;

use super::AuthMethod;
use crate::error::{ConfigurationError, FetchError};

/// OS-standard realm configuration location
pub const KRB5_CONF_PATH: &str = "/etc/krb5.conf";

/// Split a Kerberos principal into user and realm
///
/// Requires exactly one `@` with non-empty halves, e.g. `hdfs@EXAMPLE.COM`.
///
/// # Errors
/// Returns `ConfigurationError::InvalidPrincipal` for anything else
pub fn split_principal(principal: &str) -> Result<(&str, &str), ConfigurationError> {
    let mut parts = principal.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(user), Some(realm), None) if !user.is_empty() && !realm.is_empty() => {
            Ok((user, realm))
        }
        _ => Err(ConfigurationError::InvalidPrincipal(principal.to_string())),
    }
}

/// Fetch `url` with a SPNEGO-authenticated GET
///
/// The principal is validated and the SPN derived before any token work,
/// so configuration mistakes surface without touching the KDC.
pub(crate) async fn spnego_get(
    client: &reqwest::Client,
    url: &str,
    host: &str,
    auth: &AuthMethod,
    login_timeout: Duration,
) -> Result<Vec<u8>, FetchError> {
    let (user, realm) = split_principal(auth.principal()).map_err(FetchError::Configuration)?;
    let spn = format!("HTTP/{host}");
    debug!(user, realm, spn = %spn, "Negotiating SPNEGO context");

    let authorization = negotiate_header(auth.clone(), spn, login_timeout).await?;

    let response = client
        .get(url)
        .header(reqwest::header::AUTHORIZATION, authorization)
        .send()
        .await
        .map_err(FetchError::Transport)?;

    let body = response.bytes().await.map_err(FetchError::Body)?;
    Ok(body.to_vec())
}

/// Build the `Negotiate` header value for `spn`
///
/// Token acquisition may talk to the KDC, so it runs on the blocking pool
/// under the configured login timeout.
#[cfg(feature = "kerberos")]
async fn negotiate_header(
    auth: AuthMethod,
    spn: String,
    login_timeout: Duration,
) -> Result<String, FetchError> {
    let acquire = tokio::task::spawn_blocking(move || gss::initial_token(&auth, &spn));

    let token = tokio::time::timeout(login_timeout, acquire)
        .await
        .map_err(|_| FetchError::Login("Kerberos login timed out".to_string()))?
        .map_err(|e| FetchError::Login(e.to_string()))??;

    use base64::{engine::general_purpose::STANDARD, Engine as _};
    Ok(format!("Negotiate {}", STANDARD.encode(token)))
}

#[cfg(not(feature = "kerberos"))]
async fn negotiate_header(
    _auth: AuthMethod,
    _spn: String,
    _login_timeout: Duration,
) -> Result<String, FetchError> {
    Err(FetchError::Login(
        "Kerberos support is not compiled in; rebuild with the `kerberos` feature".to_string(),
    ))
}

#[cfg(feature = "kerberos")]
mod gss {
    use std::io::Write;
    use std::process::{Command, Stdio};
    use std::sync::{Mutex, PoisonError};

    use cross_krb5::{ClientCtx, InitiateFlags};
    use once_cell::sync::Lazy;

    use super::KRB5_CONF_PATH;
    use crate::error::FetchError;
    use crate::fetcher::AuthMethod;

    /// Credentials reach the GSSAPI backend through process-global state
    /// (`KRB5_CLIENT_KTNAME`, the default credential cache), so token
    /// acquisition is serialized; concurrent scrapes must never see each
    /// other's credentials.
    static CREDENTIAL_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    /// Acquire the initial SPNEGO token for `spn` as the given principal
    ///
    /// A keytab is exported through `KRB5_CLIENT_KTNAME`; a password is
    /// turned into a ticket with `kinit` first.
    pub(super) fn initial_token(auth: &AuthMethod, spn: &str) -> Result<Vec<u8>, FetchError> {
        if std::fs::metadata(KRB5_CONF_PATH).is_err() {
            return Err(FetchError::RealmConfig(format!(
                "{KRB5_CONF_PATH} is missing or unreadable"
            )));
        }

        let _guard = CREDENTIAL_LOCK
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        match auth {
            AuthMethod::Keytab { keytab, .. } => {
                std::env::set_var("KRB5_CLIENT_KTNAME", keytab);
            }
            AuthMethod::Password {
                principal,
                password,
            } => {
                // A leftover keytab export must not shadow the fresh
                // password ticket.
                std::env::remove_var("KRB5_CLIENT_KTNAME");
                password_login(principal, password)?;
            }
        }

        let (_pending, token) =
            ClientCtx::new(InitiateFlags::empty(), Some(auth.principal()), spn, None)
                .map_err(|e| FetchError::Negotiation(e.to_string()))?;

        Ok(token.to_vec())
    }

    /// Obtain a ticket-granting ticket with `kinit`
    ///
    /// The password goes to kinit's stdin, never onto the command line.
    /// A wrong password fails here instead of silently reusing whatever
    /// the credential cache still holds.
    fn password_login(principal: &str, password: &str) -> Result<(), FetchError> {
        let mut child = Command::new("kinit")
            .arg(principal)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| FetchError::Login(format!("failed to run kinit: {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(password.as_bytes())
                .and_then(|()| stdin.write_all(b"\n"))
                .map_err(|e| {
                    FetchError::Login(format!("failed to send password to kinit: {e}"))
                })?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| FetchError::Login(e.to_string()))?;
        if !output.status.success() {
            let detail = String::from_utf8_lossy(&output.stderr);
            return Err(FetchError::Login(format!(
                "kinit for '{principal}' failed: {}",
                detail.trim()
            )));
        }
        Ok(())
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_password_login_never_succeeds_without_kdc() {
            // Whether kinit is absent or cannot reach a KDC for the
            // realm, a password login must fail loudly; it must never
            // fall back to cached credentials.
            let err = password_login("nobody@EXAMPLE.INVALID", "wrong").unwrap_err();
            assert!(matches!(err, FetchError::Login(_)));
        }
    }
}
