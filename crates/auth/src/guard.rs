//! Page-load guards for protected routes.
//!
//! Guards never navigate themselves. They hand the caller's router a
//! [`Redirect`] to perform as a full (hard) redirect, as opposed to the
//! in-app [`Navigator`](crate::Navigator) hook used when a live session is
//! rejected mid-flight.

use chrono::{DateTime, Utc};

use crate::claims;
use crate::session::ROOT_ROUTE;
use crate::token_store::{TokenSlot, TokenStore};

/// A redirect the router must perform instead of rendering the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub status: u16,
    pub location: &'static str,
}

impl Redirect {
    /// 303 See Other, used by server-side guards.
    pub const fn see_other(location: &'static str) -> Self {
        Self {
            status: 303,
            location,
        }
    }

    /// 302 Found, used by client-side guards.
    pub const fn found(location: &'static str) -> Self {
        Self {
            status: 302,
            location,
        }
    }
}

/// Server-side guard: requires a live `accessToken` cookie.
pub fn require_session(cookie_header: Option<&str>, now: DateTime<Utc>) -> Result<(), Redirect> {
    let token = cookie_header.and_then(|header| cookie_value(header, TokenSlot::Access.key()));

    match token {
        Some(token) if !claims::is_expired_at(token, now) => Ok(()),
        _ => {
            tracing::debug!("access cookie missing or expired");
            Err(Redirect::see_other(ROOT_ROUTE))
        }
    }
}

/// Client-side guard: requires *some* stored access token.
///
/// Expiry is left to the gateway's 401 handling. Headless contexts pass.
pub fn require_stored_token(tokens: &TokenStore) -> Result<(), Redirect> {
    if tokens.is_interactive() && tokens.access_token().is_none() {
        return Err(Redirect::found(ROOT_ROUTE));
    }
    Ok(())
}

/// Value of `name` in a `Cookie` request header.
pub fn cookie_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().trim_matches('"'))
        .filter(|value| !value.is_empty())
}
