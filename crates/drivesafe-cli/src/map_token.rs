//! Map access token discovery.
//!
//! The map view needs a token from a small HTTP endpoint that answers
//! `{"token": "..."}`.  Any failure leaves the rest of the app running; the
//! caller shows a "Map Unavailable" notice instead.

use drivesafe_types::{Notice, SafetyError};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

/// Fetch the map token from `url`.
///
/// # Errors
///
/// [`SafetyError::MapInit`] when the endpoint is unreachable, answers with a
/// non-2xx status, or returns no usable token.
pub fn fetch_token(url: &str) -> Result<String, SafetyError> {
    let response = reqwest::blocking::get(url)
        .map_err(|e| SafetyError::MapInit(format!("token endpoint unreachable at {url}: {e}")))?;

    if !response.status().is_success() {
        return Err(SafetyError::MapInit(format!(
            "token endpoint returned HTTP {}",
            response.status()
        )));
    }

    let body: TokenResponse = response
        .json()
        .map_err(|e| SafetyError::MapInit(format!("failed to parse token response: {e}")))?;
    validate(body)
}

fn validate(body: TokenResponse) -> Result<String, SafetyError> {
    let token = body.token.trim();
    if token.is_empty() {
        return Err(SafetyError::MapInit("token endpoint returned an empty token".to_string()));
    }
    Ok(token.to_string())
}

/// The notice shown when the map cannot start.
pub fn unavailable_notice(err: &SafetyError) -> Notice {
    Notice::warning("Map Unavailable", format!("Map features are disabled: {err}"))
}
