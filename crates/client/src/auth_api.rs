//! Login and refresh endpoints.
//!
//! Credential issuance is the server's job; these calls only fetch a pair
//! through the gateway and hand it to the token store.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use villadmin_auth::CredentialPair;

use crate::error::ApiError;
use crate::gateway::ApiClient;
use crate::request::RequestOptions;

pub const LOGIN_ENDPOINT: &str = "/v1/auth/login";
pub const REFRESH_ENDPOINT: &str = "/v1/auth/refresh-token";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
struct RefreshTokenRequest<'a> {
    refresh_token: &'a str,
}

pub struct AuthApi<'a> {
    client: &'a ApiClient,
}

impl<'a> AuthApi<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn login(&self, credentials: &LoginRequest) -> Result<CredentialPair, ApiError> {
        self.issue(LOGIN_ENDPOINT, to_json(credentials)?).await
    }

    pub async fn refresh_token(&self, refresh_token: &str) -> Result<CredentialPair, ApiError> {
        self.issue(REFRESH_ENDPOINT, to_json(&RefreshTokenRequest { refresh_token })?)
            .await
    }

    /// Log in and persist the returned pair.
    pub async fn login_and_store(
        &self,
        credentials: &LoginRequest,
    ) -> Result<CredentialPair, ApiError> {
        let pair = self.login(credentials).await?;
        self.client.tokens().set_pair(&pair);
        tracing::info!("logged in");
        Ok(pair)
    }

    /// Exchange the stored refresh token and persist the new pair.
    pub async fn refresh_and_store(&self) -> Result<CredentialPair, ApiError> {
        let refresh = self
            .client
            .tokens()
            .refresh_token()
            .ok_or_else(|| ApiError::InvalidRequest("no refresh token stored".to_string()))?;

        let pair = self.refresh_token(&refresh).await?;
        self.client.tokens().set_pair(&pair);
        tracing::debug!("access token refreshed");
        Ok(pair)
    }

    async fn issue(&self, endpoint: &str, body: Value) -> Result<CredentialPair, ApiError> {
        let data = self
            .client
            .request(endpoint, RequestOptions::post().json(body))
            .await?;
        serde_json::from_value(unwrap_envelope(data)).map_err(|e| ApiError::Parse(e.to_string()))
    }
}

fn to_json<T: Serialize>(body: &T) -> Result<Value, ApiError> {
    serde_json::to_value(body).map_err(|e| ApiError::InvalidRequest(e.to_string()))
}

/// `{ "data": {...} }` yields the inner object; anything else is returned
/// unchanged.
fn unwrap_envelope(mut body: Value) -> Value {
    if body.get("data").is_some_and(Value::is_object) {
        return body["data"].take();
    }
    body
}
