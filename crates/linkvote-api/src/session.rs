use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;
use chrono::{Duration, Utc};
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};

use crate::AppState;
use crate::error::ApiError;

pub const SESSION_COOKIE: &str = "linkvote_sid";

const TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub ttl: Duration,
    pub cookie_secure: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::hours(1),
            cookie_secure: false,
        }
    }
}

/// Fresh opaque session token for the client cookie.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    B64.encode(bytes)
}

/// Only this digest is stored, so a leaked sessions table cannot be replayed.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

pub fn session_token(jar: &CookieJar) -> Option<&str> {
    jar.get(SESSION_COOKIE).map(|c| c.value()).filter(|v| !v.is_empty())
}

/// Create a session for `user_id` and attach its cookie to `jar`.
pub async fn start_session(state: &AppState, jar: CookieJar, user_id: i64) -> Result<CookieJar, ApiError> {
    let token = generate_token();
    let token_hash = hash_token(&token);
    let now = Utc::now();
    let expires_at = now + state.sessions.ttl;

    crate::with_db(state, move |db| db.create_session(&token_hash, user_id, now, expires_at)).await?;

    let cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.sessions.cookie_secure);

    Ok(jar.add(cookie))
}

pub fn clear_cookie(jar: CookieJar) -> CookieJar {
    let mut cookie = Cookie::from(SESSION_COOKIE);
    cookie.set_path("/");
    jar.remove(cookie)
}
