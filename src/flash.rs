//! One-shot notifications carried between a redirect and the next page.
//!
//! A handler returns a [`FlashRedirect`]; the [`relay`] middleware seals its
//! flash into an HS256-signed cookie. On the following request the middleware
//! opens that cookie, exposes it through [`PendingFlash`], and clears it
//! unless the new response sets a flash of its own.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, error, warn};

use crate::state::AppState;

pub const FLASH_COOKIE: &str = "flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    Success,
    Danger,
}

impl FlashKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FlashKind::Success => "success",
            FlashKind::Danger => "danger",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    #[serde(rename = "type")]
    pub kind: FlashKind,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Success,
            message: message.into(),
        }
    }

    pub fn danger(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Danger,
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct FlashClaims {
    kind: FlashKind,
    message: String,
    exp: usize,
}

/// Signing material for the flash cookie.
#[derive(Clone)]
pub struct FlashKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl FromRef<AppState> for FlashKeys {
    fn from_ref(state: &AppState) -> Self {
        FlashKeys::new(
            state.config.flash.secret.as_bytes(),
            Duration::from_secs(state.config.flash.ttl_secs),
        )
    }
}

impl FlashKeys {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    pub fn seal(&self, flash: &Flash) -> anyhow::Result<String> {
        let exp = OffsetDateTime::now_utc().unix_timestamp() + self.ttl.as_secs() as i64;
        let claims = FlashClaims {
            kind: flash.kind,
            message: flash.message.clone(),
            exp: exp as usize,
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    pub fn open(&self, token: &str) -> anyhow::Result<Flash> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        let data = decode::<FlashClaims>(token, &self.decoding, &validation)?;
        Ok(Flash {
            kind: data.claims.kind,
            message: data.claims.message,
        })
    }

    pub fn set_cookie(&self, token: &str) -> String {
        format!(
            "{FLASH_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            self.ttl.as_secs()
        )
    }
}

pub fn clear_cookie() -> String {
    format!("{FLASH_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// Value of the flash cookie in the request's `Cookie` headers, if any.
pub fn cookie_value(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == FLASH_COOKIE && !value.is_empty())
        .map(|(_, value)| value)
}

/// 302 redirect that may carry a flash for the next page.
#[derive(Debug, Clone)]
pub struct FlashRedirect {
    location: String,
    flash: Option<Flash>,
}

impl FlashRedirect {
    pub fn to(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            flash: None,
        }
    }

    pub fn with(location: impl Into<String>, flash: Flash) -> Self {
        Self {
            location: location.into(),
            flash: Some(flash),
        }
    }
}

#[cfg(test)]
impl FlashRedirect {
    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn flash(&self) -> Option<&Flash> {
        self.flash.as_ref()
    }
}

impl IntoResponse for FlashRedirect {
    fn into_response(self) -> Response {
        let mut res = StatusCode::FOUND.into_response();
        match HeaderValue::try_from(self.location.as_str()) {
            Ok(v) => {
                res.headers_mut().insert(header::LOCATION, v);
            }
            Err(e) => {
                error!(error = %e, location = %self.location, "invalid redirect location");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        }
        if let Some(flash) = self.flash {
            res.extensions_mut().insert(flash);
        }
        res
    }
}

/// The flash left by the previous response, already consumed.
#[derive(Debug, Clone, Default)]
pub struct PendingFlash(pub Option<Flash>);

#[async_trait]
impl<S> FromRequestParts<S> for PendingFlash
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<PendingFlash>().cloned().unwrap_or_default())
    }
}

/// Reads and consumes the incoming flash, then writes the outgoing one.
pub async fn relay(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let keys = FlashKeys::from_ref(&state);

    let had_cookie = cookie_value(req.headers()).is_some();
    let pending = cookie_value(req.headers()).and_then(|token| match keys.open(token) {
        Ok(flash) => Some(flash),
        Err(e) => {
            debug!(error = %e, "ignoring unreadable flash cookie");
            None
        }
    });
    req.extensions_mut().insert(PendingFlash(pending));

    let mut res = next.run(req).await;

    let outgoing = res.extensions_mut().remove::<Flash>();
    let cookie = match outgoing {
        Some(flash) => match keys.seal(&flash) {
            Ok(token) => Some(keys.set_cookie(&token)),
            Err(e) => {
                warn!(error = %e, "could not seal flash; dropping it");
                had_cookie.then(clear_cookie)
            }
        },
        None => had_cookie.then(clear_cookie),
    };

    if let Some(cookie) = cookie {
        match HeaderValue::try_from(cookie) {
            Ok(v) => {
                res.headers_mut().append(header::SET_COOKIE, v);
            }
            Err(e) => warn!(error = %e, "flash cookie is not a valid header value"),
        }
    }
    res
}
