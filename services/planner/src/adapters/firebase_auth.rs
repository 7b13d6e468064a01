//! services/planner/src/adapters/firebase_auth.rs
//!
//! Email/password authentication against the identity toolkit REST API.
//! Implements the `AuthService` port; the resulting user id feeds
//! `TravelStateManager::set_user` and the id token authorizes the realtime
//! database. Id tokens are renewed through the secure token endpoint.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use trip_planner_core::domain::AuthSession;
use trip_planner_core::ports::{AuthService, PortError, PortResult};

#[derive(Clone)]
pub struct FirebaseAuthAdapter {
    client: reqwest::Client,
    base_url: String,
    token_url: String,
    api_key: String,
}

const DEFAULT_TOKEN_URL: &str = "https://securetoken.googleapis.com";

impl FirebaseAuthAdapter {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            api_key: api_key.into(),
        }
    }

    /// Overrides the base URL of the secure token service.
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn call<B: Serialize, T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> PortResult<T> {
        let response = self
            .client
            .post(format!("{}/v1/accounts:{}", self.base_url, endpoint))
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .await
            .map_err(|e| PortError::Network(e.to_string()))?;

        read_response(response).await
    }

    async fn password_session(&self, endpoint: &str, email: &str, password: &str) -> PortResult<AuthSession> {
        let body = Credentials {
            email,
            password,
            return_secure_token: true,
        };
        let record: SessionRecord = self.call(endpoint, &body).await?;
        Ok(record.to_domain())
    }
}

async fn read_response<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> PortResult<T> {
    if !response.status().is_success() {
        let status = response.status();
        let message = response
            .json::<ErrorEnvelope>()
            .await
            .map(|e| e.error.message)
            .unwrap_or_else(|_| status.to_string());
        return Err(map_error(&message));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| PortError::Serialization(e.to_string()))
}

fn expiry(expires_in: Option<String>) -> chrono::DateTime<Utc> {
    let ttl = expires_in
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(3600);
    Utc::now() + Duration::seconds(ttl)
}

// Credential problems are reported as `Unauthorized`, everything else keeps
// the provider's message.
fn map_error(message: &str) -> PortError {
    let code = message.split([' ', ':']).next().unwrap_or(message);
    match code {
        "EMAIL_NOT_FOUND"
        | "INVALID_PASSWORD"
        | "INVALID_LOGIN_CREDENTIALS"
        | "USER_DISABLED"
        | "TOKEN_EXPIRED"
        | "INVALID_REFRESH_TOKEN"
        | "USER_NOT_FOUND" => PortError::Unauthorized,
        _ => {
            error!("Auth provider error: {}", message);
            PortError::Unexpected(message.to_string())
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OobRequest<'a> {
    request_type: &'a str,
    email: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionRecord {
    local_id: String,
    email: Option<String>,
    id_token: String,
    refresh_token: Option<String>,
    expires_in: Option<String>,
}

impl SessionRecord {
    fn to_domain(self) -> AuthSession {
        AuthSession {
            user_id: self.local_id,
            email: self.email,
            id_token: self.id_token,
            refresh_token: self.refresh_token,
            expires_at: expiry(self.expires_in),
        }
    }
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    grant_type: &'a str,
    refresh_token: &'a str,
}

/// The secure token service answers in snake_case.
#[derive(Deserialize)]
struct RefreshRecord {
    user_id: String,
    id_token: String,
    refresh_token: Option<String>,
    expires_in: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

#[async_trait]
impl AuthService for FirebaseAuthAdapter {
    async fn sign_up(&self, email: &str, password: &str) -> PortResult<AuthSession> {
        let session = self.password_session("signUp", email, password).await?;
        info!("Registered user {}", session.user_id);
        Ok(session)
    }

    async fn sign_in(&self, email: &str, password: &str) -> PortResult<AuthSession> {
        let session = self
            .password_session("signInWithPassword", email, password)
            .await?;
        info!("Signed in user {}", session.user_id);
        Ok(session)
    }

    /// Tokens are bearer credentials held by the caller; signing out only
    /// discards them, there is no server-side call.
    async fn sign_out(&self, session: &AuthSession) -> PortResult<()> {
        info!("Signed out user {}", session.user_id);
        Ok(())
    }

    async fn refresh(&self, session: &AuthSession) -> PortResult<AuthSession> {
        let refresh_token = session
            .refresh_token
            .as_deref()
            .ok_or(PortError::Unauthorized)?;
        let response = self
            .client
            .post(format!("{}/v1/token", self.token_url))
            .query(&[("key", self.api_key.as_str())])
            .form(&RefreshRequest {
                grant_type: "refresh_token",
                refresh_token,
            })
            .send()
            .await
            .map_err(|e| PortError::Network(e.to_string()))?;
        let record: RefreshRecord = read_response(response).await?;

        info!("Refreshed id token for user {}", record.user_id);
        Ok(AuthSession {
            user_id: record.user_id,
            email: session.email.clone(),
            id_token: record.id_token,
            refresh_token: record.refresh_token.or_else(|| session.refresh_token.clone()),
            expires_at: expiry(record.expires_in),
        })
    }

    async fn reset_password(&self, email: &str) -> PortResult<()> {
        let body = OobRequest {
            request_type: "PASSWORD_RESET",
            email,
        };
        let _: serde_json::Value = self.call("sendOobCode", &body).await?;
        info!("Password reset email requested");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_errors_are_unauthorized() {
        assert!(matches!(map_error("INVALID_PASSWORD"), PortError::Unauthorized));
        assert!(matches!(
            map_error("INVALID_LOGIN_CREDENTIALS"),
            PortError::Unauthorized
        ));
    }

    #[test]
    fn other_errors_keep_message() {
        match map_error("WEAK_PASSWORD : Password should be at least 6 characters") {
            PortError::Unexpected(message) => assert!(message.starts_with("WEAK_PASSWORD")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
