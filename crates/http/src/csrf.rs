//! Signed form tokens protecting POST forms from cross-site submission.
//!
//! Each client holds a form session: a random id carried in the `shelf_csrf`
//! cookie (`HttpOnly`, `SameSite=Lax`) next to its HMAC-SHA256 signature.
//! A form token is a `(nonce, signature)` pair where the nonce is
//! `{unix_seconds}.{uuid}` and the signature is the hex HMAC of the session id
//! and the nonce. Tokens are carried as hidden form fields, so a token scraped
//! by one client never verifies under another client's cookie.

use std::time::Duration;

use anyhow::anyhow;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use shelf_kernel::settings::Settings;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::html;

type HmacSha256 = Hmac<Sha256>;

/// Hidden field carrying the nonce
pub const NONCE_FIELD: &str = "csrf_nonce";
/// Hidden field carrying the signature
pub const TOKEN_FIELD: &str = "csrf_token";
/// Cookie carrying the signed form session id
pub const SESSION_COOKIE: &str = "shelf_csrf";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CsrfError {
    #[error("the form token is missing")]
    Missing,

    #[error("the form session cookie is missing or invalid")]
    MissingSession,

    #[error("the form token is malformed")]
    Malformed,

    #[error("the form token signature does not match")]
    BadSignature,

    #[error("the form token has expired")]
    Expired,
}

/// Token issued for one rendered form
#[derive(Debug, Clone)]
pub struct CsrfToken {
    pub nonce: String,
    pub signature: String,
}

impl CsrfToken {
    /// Hidden inputs to embed inside a `<form>`.
    pub fn hidden_fields(&self) -> String {
        format!(
            r#"<input type="hidden" name="{}" value="{}"><input type="hidden" name="{}" value="{}">"#,
            NONCE_FIELD,
            html::escape(&self.nonce),
            TOKEN_FIELD,
            html::escape(&self.signature),
        )
    }
}

/// Issues and verifies form tokens with a process-wide secret
#[derive(Clone)]
pub struct CsrfGuard {
    mac: HmacSha256,
    ttl: Duration,
}

impl CsrfGuard {
    pub fn new(secret: impl AsRef<[u8]>, ttl: Duration) -> anyhow::Result<Self> {
        let mac = HmacSha256::new_from_slice(secret.as_ref())
            .map_err(|e| anyhow!("invalid form signing key: {}", e))?;
        Ok(Self { mac, ttl })
    }

    /// Build the guard from settings.
    ///
    /// Without a configured secret the local environment falls back to a
    /// random per-process key; every other environment refuses to start.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let ttl = Duration::from_secs(settings.security.csrf_ttl_secs);

        match settings.security.secret_key.as_deref() {
            Some(secret) if !secret.is_empty() => Self::new(secret, ttl),
            _ if settings.environment.is_development() => {
                tracing::warn!(
                    "SHELF_SECURITY__SECRET_KEY is not set; using a random key, forms will not survive restarts"
                );
                let secret = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
                Self::new(secret, ttl)
            }
            _ => Err(anyhow!(
                "security.secret_key is required outside the local environment (set SHELF_SECURITY__SECRET_KEY)"
            )),
        }
    }

    /// Token for a form rendered to the client holding `jar`.
    ///
    /// Reuses the client's session when its cookie is valid, otherwise starts a
    /// new one. The returned jar must be sent back with the response.
    pub fn begin(&self, jar: CookieJar) -> (CookieJar, CsrfToken) {
        match self.session_from(&jar) {
            Some(session) => {
                let token = self.issue(&session);
                (jar, token)
            }
            None => {
                let session = Uuid::new_v4().simple().to_string();
                let token = self.issue(&session);
                (jar.add(self.session_cookie(&session)), token)
            }
        }
    }

    /// Signed session cookie for `session`.
    pub fn session_cookie(&self, session: &str) -> Cookie<'static> {
        let value = format!("{}.{}", session, self.sign(&["session", session]));
        Cookie::build((SESSION_COOKIE, value))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .build()
    }

    /// Issue a fresh token bound to `session`.
    pub fn issue(&self, session: &str) -> CsrfToken {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let nonce = format!("{}.{}", now, Uuid::new_v4().simple());
        let signature = self.sign(&["form", session, &nonce]);
        CsrfToken { nonce, signature }
    }

    /// Verify a submitted token against the session cookie in `jar`.
    pub fn verify(
        &self,
        jar: &CookieJar,
        nonce: Option<&str>,
        signature: Option<&str>,
    ) -> Result<(), CsrfError> {
        self.verify_at(
            jar,
            nonce,
            signature,
            OffsetDateTime::now_utc().unix_timestamp(),
        )
    }

    fn verify_at(
        &self,
        jar: &CookieJar,
        nonce: Option<&str>,
        signature: Option<&str>,
        now: i64,
    ) -> Result<(), CsrfError> {
        let (nonce, signature) = match (nonce, signature) {
            (Some(n), Some(s)) if !n.is_empty() && !s.is_empty() => (n, s),
            _ => return Err(CsrfError::Missing),
        };

        let session = self.session_from(jar).ok_or(CsrfError::MissingSession)?;

        let issued_at: i64 = nonce
            .split_once('.')
            .and_then(|(ts, _)| ts.parse().ok())
            .ok_or(CsrfError::Malformed)?;

        if !self.check(&["form", &session, nonce], signature) {
            return Err(CsrfError::BadSignature);
        }

        let age = now.saturating_sub(issued_at);
        if age < 0 || age as u64 > self.ttl.as_secs() {
            return Err(CsrfError::Expired);
        }

        Ok(())
    }

    fn session_from(&self, jar: &CookieJar) -> Option<String> {
        let cookie = jar.get(SESSION_COOKIE)?;
        let (session, signature) = cookie.value().rsplit_once('.')?;
        if session.is_empty() || !self.check(&["session", session], signature) {
            return None;
        }
        Some(session.to_string())
    }

    fn keyed(&self, parts: &[&str]) -> HmacSha256 {
        let mut mac = self.mac.clone();
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                mac.update(b":");
            }
            mac.update(part.as_bytes());
        }
        mac
    }

    fn sign(&self, parts: &[&str]) -> String {
        hex::encode(self.keyed(parts).finalize().into_bytes())
    }

    fn check(&self, parts: &[&str], signature: &str) -> bool {
        match hex::decode(signature) {
            Ok(expected) => self.keyed(parts).verify_slice(&expected).is_ok(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelf_kernel::settings::Environment;

    fn guard() -> CsrfGuard {
        CsrfGuard::new("test-secret", Duration::from_secs(60)).unwrap()
    }

    fn jar_for(guard: &CsrfGuard, session: &str) -> CookieJar {
        CookieJar::new().add(guard.session_cookie(session))
    }

    #[test]
    fn issued_token_verifies() {
        let guard = guard();
        let (jar, token) = guard.begin(CookieJar::new());
        assert_eq!(
            guard.verify(&jar, Some(&token.nonce), Some(&token.signature)),
            Ok(())
        );
    }

    #[test]
    fn begin_sets_a_locked_down_cookie_once() {
        let guard = guard();
        let (jar, _) = guard.begin(CookieJar::new());

        let cookie = jar.get(SESSION_COOKIE).unwrap();
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));

        let value = cookie.value().to_string();
        let (again, _) = guard.begin(jar);
        assert_eq!(again.get(SESSION_COOKIE).unwrap().value(), value);
    }

    #[test]
    fn token_is_bound_to_its_session() {
        let guard = guard();
        let token = guard.issue("attacker");

        assert_eq!(
            guard.verify(&jar_for(&guard, "victim"), Some(&token.nonce), Some(&token.signature)),
            Err(CsrfError::BadSignature)
        );
        assert_eq!(
            guard.verify(&CookieJar::new(), Some(&token.nonce), Some(&token.signature)),
            Err(CsrfError::MissingSession)
        );
    }

    #[test]
    fn forged_session_cookie_is_rejected() {
        let guard = guard();
        let token = guard.issue("victim");
        let forged = CookieJar::new().add(Cookie::new(SESSION_COOKIE, "victim.deadbeef"));

        assert_eq!(
            guard.verify(&forged, Some(&token.nonce), Some(&token.signature)),
            Err(CsrfError::MissingSession)
        );
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let other = CsrfGuard::new("other", Duration::from_secs(60)).unwrap();
        let guard = guard();
        let token = other.issue("client");
        assert_eq!(
            guard.verify(&jar_for(&guard, "client"), Some(&token.nonce), Some(&token.signature)),
            Err(CsrfError::BadSignature)
        );
    }

    #[test]
    fn missing_and_malformed_tokens_are_rejected() {
        let guard = guard();
        let jar = jar_for(&guard, "client");
        assert_eq!(guard.verify(&jar, None, Some("abc")), Err(CsrfError::Missing));
        assert_eq!(guard.verify(&jar, Some(""), Some("abc")), Err(CsrfError::Missing));
        assert_eq!(
            guard.verify(&jar, Some("no-timestamp"), Some("abc")),
            Err(CsrfError::Malformed)
        );
        assert_eq!(
            guard.verify(&jar, Some("1.abc"), Some("not hex")),
            Err(CsrfError::BadSignature)
        );
    }

    #[test]
    fn expired_token_is_rejected() {
        let guard = guard();
        let token = guard.issue("client");
        let later = OffsetDateTime::now_utc().unix_timestamp() + 120;
        assert_eq!(
            guard.verify_at(
                &jar_for(&guard, "client"),
                Some(&token.nonce),
                Some(&token.signature),
                later
            ),
            Err(CsrfError::Expired)
        );
    }

    #[test]
    fn hidden_fields_carry_both_values() {
        let token = guard().issue("client");
        let fields = token.hidden_fields();
        assert!(fields.contains(&token.nonce));
        assert!(fields.contains(&token.signature));
        assert!(fields.contains(NONCE_FIELD));
        assert!(fields.contains(TOKEN_FIELD));
    }

    #[test]
    fn secret_is_required_outside_local() {
        let mut settings = Settings::default();
        assert!(CsrfGuard::from_settings(&settings).is_ok());

        settings.environment = Environment::Production;
        assert!(CsrfGuard::from_settings(&settings).is_err());

        settings.security.secret_key = Some("configured".to_string());
        assert!(CsrfGuard::from_settings(&settings).is_ok());
    }
}
