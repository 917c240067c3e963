//! Credential decoding.
//!
//! Tokens are compact `header.payload.signature` strings. The client never
//! verifies signatures (the API is the authority); it only reads the payload
//! to drive UX and role gating. Every failure here degrades to "no claims",
//! which callers treat as expired.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use chrono::{DateTime, Duration, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::RoleLevel;

/// Default window for [`is_expiring_soon`].
pub const EXPIRING_SOON_THRESHOLD_SECS: i64 = 5 * 60;

/// Standard alphabet, padding optional, lenient trailing bits.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Claims read from an access token payload.
///
/// `exp` is required; a payload without it does not decode at all.
/// `level` is optional; it may arrive as a number or a numeric string, and
/// an unusable value reads as absent rather than failing the whole payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Expiry, Unix seconds.
    #[serde(deserialize_with = "unix_seconds")]
    pub exp: i64,

    #[serde(
        default,
        deserialize_with = "lenient_level",
        skip_serializing_if = "Option::is_none"
    )]
    pub level: Option<RoleLevel>,

    /// Any other claims the issuer included (`sub`, `iat`, ...).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Claims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }

    /// `exp` strictly before `now` (whole seconds).
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp < now.timestamp()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("token must have exactly three dot-separated segments")]
    Format,

    #[error("payload segment is not valid base64")]
    Base64,

    #[error("payload is not a valid claims object: {0}")]
    Payload(String),
}

/// Decode the payload segment, reporting why it failed.
pub fn try_decode(token: &str) -> Result<Claims, DecodeError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(DecodeError::Format);
    }

    let payload = segments[1].replace('-', "+").replace('_', "/");
    let bytes = PAYLOAD_ENGINE
        .decode(payload.as_bytes())
        .map_err(|_| DecodeError::Base64)?;

    serde_json::from_slice(&bytes).map_err(|e| DecodeError::Payload(e.to_string()))
}

/// Decode a token's claims without verifying its signature.
pub fn decode(token: &str) -> Option<Claims> {
    match try_decode(token) {
        Ok(claims) => Some(claims),
        Err(err) => {
            tracing::trace!(error = %err, "token claims unreadable");
            None
        }
    }
}

/// Fail-closed expiry check: unreadable tokens are expired.
pub fn is_expired_at(token: &str, now: DateTime<Utc>) -> bool {
    decode(token).is_none_or(|claims| claims.is_expired_at(now))
}

pub fn is_expired(token: &str) -> bool {
    is_expired_at(token, Utc::now())
}

/// Whether the token expires before `now + threshold`.
///
/// For proactive UX (e.g. prompting a refresh); never used for gating.
pub fn is_expiring_soon_at(token: &str, threshold: Duration, now: DateTime<Utc>) -> bool {
    let horizon = (now + threshold).timestamp();
    decode(token).is_none_or(|claims| claims.exp < horizon)
}

pub fn is_expiring_soon(token: &str) -> bool {
    is_expiring_soon_at(
        token,
        Duration::seconds(EXPIRING_SOON_THRESHOLD_SECS),
        Utc::now(),
    )
}

pub fn expiration_instant(token: &str) -> Option<DateTime<Utc>> {
    decode(token)?.expires_at()
}

/// Remaining lifetime as `"<m>m <s>s"`, `"<s>s"` or `"Expired"`.
///
/// `None` when the token carries no readable expiry.
pub fn time_until_expiration_at(token: &str, now: DateTime<Utc>) -> Option<String> {
    let expires_at = expiration_instant(token)?;
    Some(format_remaining(expires_at - now))
}

pub fn time_until_expiration(token: &str) -> Option<String> {
    time_until_expiration_at(token, Utc::now())
}

pub fn format_remaining(remaining: Duration) -> String {
    if remaining <= Duration::zero() {
        return "Expired".to_string();
    }

    let total = remaining.num_seconds();
    let (minutes, seconds) = (total / 60, total % 60);
    if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

fn unix_seconds<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let number = serde_json::Number::deserialize(deserializer)?;
    number
        .as_i64()
        .or_else(|| {
            number
                .as_f64()
                .filter(|f| f.is_finite())
                .map(|f| f.floor() as i64)
        })
        .ok_or_else(|| D::Error::custom("exp is not a usable timestamp"))
}

fn lenient_level<'de, D>(deserializer: D) -> Result<Option<RoleLevel>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let level = match value {
        Some(Value::Number(n)) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Some(Value::String(s)) => s.trim().parse::<u32>().ok(),
        _ => None,
    };
    Ok(level.map(RoleLevel::new))
}
