//! Registration lookup over HTTP
//!
//! The external call that determines whether a canonical identifier belongs
//! to an existing account: `GET {base}/{identifier}` returning
//! `{success, data: {isRegistered, user?, message?}}`. The trait seam lets
//! the resolver run against a mock in tests.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use ciphertalk_core::{RegistrationEntry, RegistrationVerdict, UserSummary};

// ----------------------------------------------------------------------------
// Errors
// ----------------------------------------------------------------------------

/// Failures of the registration lookup
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("lookup request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend reported failure: {0}")]
    Backend(String),

    #[error("malformed lookup response: {0}")]
    MalformedResponse(String),
}

// ----------------------------------------------------------------------------
// Lookup Trait
// ----------------------------------------------------------------------------

/// External collaborator resolving one canonical identifier
#[async_trait]
pub trait RegistrationLookup: Send + Sync {
    /// Issue exactly one lookup for `identifier`
    async fn lookup(&self, identifier: &str) -> Result<RegistrationEntry, LookupError>;
}

// ----------------------------------------------------------------------------
// Wire Types
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct LookupResponse {
    success: bool,
    #[serde(default)]
    data: Option<LookupData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupData {
    is_registered: bool,
    #[serde(default)]
    user: Option<UserSummary>,
    #[serde(default)]
    message: Option<String>,
}

fn entry_from_response(
    identifier: &str,
    response: LookupResponse,
) -> Result<RegistrationEntry, LookupError> {
    if !response.success {
        return Err(LookupError::Backend(
            response
                .data
                .and_then(|d| d.message)
                .unwrap_or_else(|| "lookup failed".to_string()),
        ));
    }

    let data = response
        .data
        .ok_or_else(|| LookupError::MalformedResponse("missing data".to_string()))?;

    let verdict = if data.is_registered {
        let user = data.user.ok_or_else(|| {
            LookupError::MalformedResponse("registered user without profile".to_string())
        })?;
        RegistrationVerdict::Registered(user)
    } else {
        RegistrationVerdict::NotRegistered(
            data.message.unwrap_or_else(|| "not registered".to_string()),
        )
    };

    Ok(RegistrationEntry {
        identifier: identifier.to_string(),
        verdict,
    })
}

// ----------------------------------------------------------------------------
// HTTP Implementation
// ----------------------------------------------------------------------------

/// Registration lookup against the CipherTalk backend
pub struct HttpRegistrationLookup {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRegistrationLookup {
    /// Create a lookup client for the given base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Create a lookup client reusing an existing HTTP client
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl RegistrationLookup for HttpRegistrationLookup {
    async fn lookup(&self, identifier: &str) -> Result<RegistrationEntry, LookupError> {
        let url = format!("{}/{}", self.base_url, identifier);
        debug!(%url, "registration lookup request");

        let response = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<LookupResponse>()
            .await?;

        entry_from_response(identifier, response)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> LookupResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn maps_registered_response() {
        let response = parse(
            r#"{
                "success": true,
                "data": {
                    "isRegistered": true,
                    "user": {
                        "id": "u-42",
                        "firstName": "Grace",
                        "lastName": "Hopper",
                        "profilePicture": "https://cdn.example.com/u-42.png"
                    }
                }
            }"#,
        );
        let entry = entry_from_response("4155552671", response).unwrap();
        assert!(entry.is_registered());
        match entry.verdict {
            RegistrationVerdict::Registered(user) => {
                assert_eq!(user.id, "u-42");
                assert_eq!(user.profile_picture.as_deref(), Some("https://cdn.example.com/u-42.png"));
            }
            other => panic!("unexpected verdict: {other:?}"),
        }
    }

    #[test]
    fn maps_not_registered_response() {
        let response = parse(
            r#"{
                "success": true,
                "data": { "isRegistered": false, "message": "not found" }
            }"#,
        );
        let entry = entry_from_response("000000", response).unwrap();
        assert_eq!(
            entry.verdict,
            RegistrationVerdict::NotRegistered("not found".to_string())
        );
    }

    #[test]
    fn backend_failure_becomes_error() {
        let response = parse(
            r#"{
                "success": false,
                "data": { "isRegistered": false, "message": "rate limited" }
            }"#,
        );
        let err = entry_from_response("4155552671", response).unwrap_err();
        assert!(matches!(err, LookupError::Backend(msg) if msg == "rate limited"));
    }

    #[test]
    fn missing_data_is_malformed() {
        let response = parse(r#"{ "success": true }"#);
        let err = entry_from_response("4155552671", response).unwrap_err();
        assert!(matches!(err, LookupError::MalformedResponse(_)));
    }

    #[test]
    fn registered_without_profile_is_malformed() {
        let response = parse(
            r#"{
                "success": true,
                "data": { "isRegistered": true }
            }"#,
        );
        let err = entry_from_response("4155552671", response).unwrap_err();
        assert!(matches!(err, LookupError::MalformedResponse(_)));
    }
}
