// ============================================
// File: crates/wstun-client/src/endpoint.rs
// ============================================
//! # Endpoint Resolution
//!
//! ## Creation Reason
//! Turns the configured URL and optional credentials file into what the
//! WebSocket dialer needs: a URL without userinfo and an `Authorization`
//! header value.
//!
//! ## Main Functionality
//! - `Credentials`: username with optional password
//! - `Endpoint::resolve`: read the auth file, strip URL userinfo
//! - `Endpoint::log_warnings`: loud warnings for weak setups
//!
//! ## Credential Precedence
//! ```text
//!   --auth-file given ──► file contents ("user:password" or "user")
//!   otherwise ─────────► userinfo embedded in the URL, if any
//! ```
//! URL userinfo is always stripped before dialing, even when the auth
//! file wins.
//!
//! ## ⚠️ Important Note for Next Developer
//! - `Endpoint::url` is safe to log; the raw configured URL is not
//! - Credentials are sent as HTTP Basic over whatever the scheme gives;
//!   `ws://` means cleartext
//!
//! ## Last Modified
//! v0.1.0 - Initial endpoint resolution

use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use tracing::{info, warn};
use url::Url;

use crate::error::{ClientError, Result};

/// How many times each production warning is repeated.
const WARNING_REPEAT: usize = 6;

// ============================================
// Credentials
// ============================================

/// HTTP Basic credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: Option<String>,
}

impl Credentials {
    /// Creates credentials.
    #[must_use]
    pub fn new(username: impl Into<String>, password: Option<String>) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }

    /// Parses auth file contents: `user:password` or `user`. Only the
    /// first `:` separates; trailing line breaks are ignored.
    ///
    /// # Errors
    /// Returns `AuthFile` if the username is empty.
    pub fn from_auth_file(path: &str, contents: &str) -> Result<Self> {
        let line = contents.trim_end_matches(['\r', '\n']);
        let (username, password) = match line.split_once(':') {
            Some((user, pass)) => (user, Some(pass.to_string())),
            None => (line, None),
        };
        if username.is_empty() {
            return Err(ClientError::auth_file(path, "username is empty"));
        }
        Ok(Self::new(username, password))
    }

    /// Username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns `true` if a password is present (it may be empty).
    #[must_use]
    pub fn has_password(&self) -> bool {
        self.password.is_some()
    }

    /// `Authorization` header value.
    #[must_use]
    pub fn authorization(&self) -> String {
        let userinfo = match &self.password {
            Some(password) => format!("{}:{}", self.username, password),
            None => self.username.clone(),
        };
        format!("Basic {}", BASE64.encode(userinfo))
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

// ============================================
// Endpoint
// ============================================

/// A dialable endpoint.
#[derive(Debug, Clone)]
pub struct Endpoint {
    url: Url,
    credentials: Option<Credentials>,
    url_had_userinfo: bool,
}

impl Endpoint {
    /// Resolves the endpoint, reading `auth_file` if given.
    ///
    /// # Errors
    /// - `ConfigInvalid` if the URL does not parse or is not ws/wss
    /// - `AuthFile` if the credentials file cannot be read
    pub async fn resolve(raw_url: &str, auth_file: Option<&Path>) -> Result<Self> {
        let file_credentials = match auth_file {
            Some(path) => {
                let path_str = path.display().to_string();
                let contents = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| ClientError::auth_file(&path_str, e.to_string()))?;
                Some(Credentials::from_auth_file(&path_str, &contents)?)
            }
            None => None,
        };
        Self::parse(raw_url, file_credentials)
    }

    /// Resolves the endpoint from already loaded credentials.
    ///
    /// # Errors
    /// Returns `ConfigInvalid` if the URL does not parse or is not ws/wss.
    pub fn parse(raw_url: &str, file_credentials: Option<Credentials>) -> Result<Self> {
        let mut url = Url::parse(raw_url)
            .map_err(|e| ClientError::config_invalid("connection.url", e.to_string()))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(ClientError::config_invalid(
                "connection.url",
                "scheme must be ws or wss",
            ));
        }

        let url_had_userinfo = !url.username().is_empty() || url.password().is_some();
        let url_credentials = url_had_userinfo.then(|| {
            Credentials::new(url.username(), url.password().map(str::to_string))
        });

        if url_had_userinfo {
            url.set_username("")
                .and_then(|()| url.set_password(None))
                .map_err(|()| {
                    ClientError::config_invalid("connection.url", "cannot strip credentials")
                })?;
        }

        Ok(Self {
            url,
            credentials: file_credentials.or(url_credentials),
            url_had_userinfo,
        })
    }

    /// URL to dial, without userinfo.
    #[must_use]
    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Credentials in effect, if any.
    #[must_use]
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// `Authorization` header value, if there are credentials.
    #[must_use]
    pub fn authorization(&self) -> Option<String> {
        self.credentials.as_ref().map(Credentials::authorization)
    }

    /// Logs who we connect as, plus warnings for weak setups.
    pub fn log_warnings(&self) {
        if self.url_had_userinfo {
            production_warning("PASSWORD ON THE COMMAND LINE");
        }

        match &self.credentials {
            Some(credentials) => {
                info!(
                    "Connecting to {} as user {}.",
                    self.url(),
                    credentials.username()
                );
                if !credentials.has_password() {
                    production_warning("NO PASSWORD SET");
                }
            }
            None => {
                info!("Connecting to {} without authentication.", self.url());
                production_warning("NO AUTHENTICATION SET");
            }
        }
    }
}

fn production_warning(what: &str) {
    for _ in 0..WARNING_REPEAT {
        warn!("DO NOT USE THIS IN PRODUCTION! {}!", what);
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_file_formats() {
        let both = Credentials::from_auth_file("auth", "alice:s3cr:et\n").unwrap();
        assert_eq!(both.username(), "alice");
        assert_eq!(both.authorization(), format!("Basic {}", BASE64.encode("alice:s3cr:et")));

        let user_only = Credentials::from_auth_file("auth", "bob\r\n").unwrap();
        assert!(!user_only.has_password());
        assert_eq!(user_only.authorization(), format!("Basic {}", BASE64.encode("bob")));

        assert!(Credentials::from_auth_file("auth", "\n").is_err());
    }

    #[test]
    fn test_url_credentials_are_stripped() {
        let endpoint = Endpoint::parse("wss://carol:pw@vpn.example.net/tunnel", None).unwrap();
        assert_eq!(endpoint.url(), "wss://vpn.example.net/tunnel");
        assert_eq!(endpoint.credentials().unwrap().username(), "carol");
        assert_eq!(
            endpoint.authorization().unwrap(),
            format!("Basic {}", BASE64.encode("carol:pw"))
        );
        assert!(!format!("{endpoint:?}").contains("pw"));
    }

    #[test]
    fn test_auth_file_wins_over_url() {
        let file = Credentials::new("dave", Some("filepw".into()));
        let endpoint = Endpoint::parse("ws://carol:pw@127.0.0.1:9000/", Some(file)).unwrap();
        assert_eq!(endpoint.url(), "ws://127.0.0.1:9000/");
        assert_eq!(endpoint.credentials().unwrap().username(), "dave");
    }

    #[test]
    fn test_no_credentials() {
        let endpoint = Endpoint::parse("ws://127.0.0.1:9000/", None).unwrap();
        assert!(endpoint.authorization().is_none());
        assert!(Endpoint::parse("http://127.0.0.1/", None).is_err());
        assert!(Endpoint::parse("not a url", None).is_err());
    }

    #[tokio::test]
    async fn test_resolve_reads_auth_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth");
        std::fs::write(&path, "erin:hunter2\n").unwrap();

        let endpoint = Endpoint::resolve("ws://127.0.0.1:9000/", Some(&path)).await.unwrap();
        assert_eq!(endpoint.credentials().unwrap().username(), "erin");

        let missing = Endpoint::resolve("ws://127.0.0.1:9000/", Some(&dir.path().join("nope"))).await;
        assert!(matches!(missing, Err(ClientError::AuthFile { .. })));
    }
}
