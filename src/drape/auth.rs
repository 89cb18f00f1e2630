//! Single-user login and the session cookie.
//!
//! There is exactly one account, configured through `AUTH_USERNAME` / `AUTH_PASSWORD`. A
//! successful login sets the `auth_token` cookie to a value derived from those credentials,
//! so changing either one invalidates every outstanding session. Nothing is stored server
//! side.

use crate::drape::config::StudioConfig;
use crate::drape::error::StudioError;
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::Duration;
use subtle::ConstantTimeEq;

/// Name of the session cookie.
pub const AUTH_COOKIE: &str = "auth_token";
/// Session cookie lifetime.
pub const SESSION_MAX_AGE: Duration = Duration::from_secs(60 * 60 * 24 * 7);

/// The one accepted username/password pair.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Credentials that accept exactly `username` and `password`.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Credentials from `AUTH_USERNAME` / `AUTH_PASSWORD`.
    pub fn from_config(config: &StudioConfig) -> Self {
        Self::new(&config.auth_username, &config.auth_password)
    }

    /// Check a login attempt. Failure carries no hint about which half was wrong.
    pub fn verify(&self, username: &str, password: &str) -> Result<(), StudioError> {
        // Compare digests so neither length nor content leaks through timing.
        let expected = Sha256::digest(format!("{}:{}", self.username, self.password).as_bytes());
        let provided = Sha256::digest(format!("{}:{}", username, password).as_bytes());
        if bool::from(expected.ct_eq(&provided)) {
            Ok(())
        } else {
            log::warn!("drape::auth::Credentials::verify(...): rejected login attempt");
            Err(StudioError::Auth)
        }
    }

    /// Value stored in the session cookie after a successful login.
    pub fn session_token(&self) -> String {
        let digest = Sha256::digest(
            format!("drape-session:{}:{}", self.username, self.password).as_bytes(),
        );
        digest.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// `true` if `token` is the current session token.
    pub fn verify_session_token(&self, token: &str) -> bool {
        let expected = Sha256::digest(self.session_token().as_bytes());
        let provided = Sha256::digest(token.as_bytes());
        expected.ct_eq(&provided).into()
    }

    /// `Set-Cookie` header value establishing a session.
    pub fn session_cookie(&self) -> String {
        format!(
            "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
            AUTH_COOKIE,
            self.session_token(),
            SESSION_MAX_AGE.as_secs()
        )
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// `Set-Cookie` header value that ends the session.
pub fn clear_session_cookie() -> String {
    format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", AUTH_COOKIE)
}

/// Find the session token in a `Cookie` request header.
pub fn session_token_from_cookie_header(header: &str) -> Option<&str> {
    header.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name.trim() == AUTH_COOKIE).then(|| value.trim())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_only_the_configured_pair() {
        let creds = Credentials::new("studio", "s3cret");
        assert!(creds.verify("studio", "s3cret").is_ok());
        assert_eq!(creds.verify("studio", "nope"), Err(StudioError::Auth));
        assert_eq!(creds.verify("Studio", "s3cret"), Err(StudioError::Auth));
        assert!(creds.verify("studio:s3cret", "").is_err());
    }

    #[test]
    fn session_token_tracks_credentials() {
        let creds = Credentials::new("studio", "s3cret");
        let token = creds.session_token();
        assert_eq!(token.len(), 64);
        assert!(creds.verify_session_token(&token));
        assert!(!creds.verify_session_token("authenticated"));
        assert!(!Credentials::new("studio", "rotated").verify_session_token(&token));
    }

    #[test]
    fn cookie_attributes() {
        let cookie = Credentials::new("u", "p").session_cookie();
        assert!(cookie.starts_with("auth_token="));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.ends_with("Max-Age=604800"));
        assert!(clear_session_cookie().ends_with("Max-Age=0"));
    }

    #[test]
    fn parses_cookie_header() {
        assert_eq!(
            session_token_from_cookie_header("theme=dark; auth_token=abc123; x=1"),
            Some("abc123")
        );
        assert_eq!(session_token_from_cookie_header("theme=dark"), None);
    }
}
