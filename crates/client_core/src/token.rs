use base64::{
    engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD},
    Engine as _,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token is not a three-part signed token")]
    Malformed,
    #[error("token payload is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("token payload is not a JSON claim set: {0}")]
    Claims(#[from] serde_json::Error),
    #[error("token carries no usable exp claim")]
    MissingExpiry,
}

#[derive(Debug, Deserialize)]
struct ExpiryClaim {
    #[serde(default)]
    exp: Option<f64>,
}

pub fn token_expiry(token: &str) -> Result<DateTime<Utc>, TokenError> {
    let mut parts = token.trim().split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(TokenError::Malformed);
    };

    let payload = payload.trim_end_matches('=');
    let bytes = match URL_SAFE_NO_PAD.decode(payload) {
        Ok(bytes) => bytes,
        Err(_) => STANDARD_NO_PAD.decode(payload)?,
    };
    let claim: ExpiryClaim = serde_json::from_slice(&bytes)?;
    let exp = claim
        .exp
        .filter(|exp| exp.is_finite())
        .ok_or(TokenError::MissingExpiry)?;

    let secs = exp.floor();
    let nanos = ((exp - secs) * 1_000_000_000.0) as u32;
    DateTime::from_timestamp(secs as i64, nanos).ok_or(TokenError::MissingExpiry)
}

/// True when the token decodes and its expiry lies strictly after `now`.
pub fn is_token_live(token: &str, now: DateTime<Utc>) -> bool {
    token_expiry(token).is_ok_and(|expires_at| expires_at > now)
}

#[cfg(test)]
#[path = "tests/token_tests.rs"]
mod tests;
