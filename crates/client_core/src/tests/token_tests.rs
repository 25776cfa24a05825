use super::*;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, TimeZone};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Serialize;

#[derive(Serialize)]
struct Claims {
    sub: &'static str,
    exp: i64,
}

fn mint(exp: i64) -> String {
    encode(
        &Header::default(),
        &Claims { sub: "vendor-1", exp },
        &EncodingKey::from_secret(b"test-secret"),
    )
    .expect("mint token")
}

fn with_payload(payload: &str) -> String {
    format!("eyJhbGciOiJIUzI1NiJ9.{}.sig", URL_SAFE_NO_PAD.encode(payload))
}

#[test]
fn reads_exp_claim_from_signed_token() {
    let exp = Utc.with_ymd_and_hms(2030, 6, 1, 12, 0, 0).unwrap();
    let token = mint(exp.timestamp());
    assert_eq!(token_expiry(&token).unwrap(), exp);
}

#[test]
fn fractional_exp_is_accepted() {
    let token = with_payload(r#"{"exp":1700000000.5}"#);
    let expires_at = token_expiry(&token).unwrap();
    assert_eq!(expires_at.timestamp(), 1_700_000_000);
    assert_eq!(expires_at.timestamp_subsec_millis(), 500);
}

#[test]
fn liveness_is_strictly_before_expiry() {
    let now = Utc::now();
    let token = mint(now.timestamp() + 60);
    assert!(is_token_live(&token, now));
    assert!(!is_token_live(&token, now + Duration::seconds(120)));

    let expired = mint(now.timestamp() - 1);
    assert!(!is_token_live(&expired, now));
}

#[test]
fn rejects_tokens_without_three_parts() {
    assert!(matches!(token_expiry("abc.def"), Err(TokenError::Malformed)));
    assert!(matches!(token_expiry("a.b.c.d"), Err(TokenError::Malformed)));
    assert!(matches!(token_expiry(""), Err(TokenError::Malformed)));
}

#[test]
fn rejects_undecodable_payloads() {
    assert!(matches!(
        token_expiry("head.!!!.sig"),
        Err(TokenError::Encoding(_))
    ));
    assert!(matches!(
        token_expiry(&with_payload("not json")),
        Err(TokenError::Claims(_))
    ));
}

#[test]
fn missing_exp_is_an_error() {
    assert!(matches!(
        token_expiry(&with_payload(r#"{"sub":"vendor-1"}"#)),
        Err(TokenError::MissingExpiry)
    ));
    assert!(!is_token_live(&with_payload(r#"{"sub":"vendor-1"}"#), Utc::now()));
}
