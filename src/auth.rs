//! Authentication endpoints and the bearer header
//!
//! [`AuthApi`] wraps the sign-in flows of the backend on top of a
//! [`Client`]. Successful sign-ins persist the token and the user summary in
//! the client's [`crate::TokenStore`], so every later authenticated request
//! carries the token automatically.
//!
//! # Examples
//!
//! ```rust,no_run
//! use ferrule::{AuthApi, Client};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::new("https://api.example.com")?;
//! let auth = AuthApi::new(client.clone());
//!
//! let session = auth.login("ada@example.com", "hunter2").await?;
//! println!("signed in as {:?}", session.user.and_then(|u| u.name));
//!
//! auth.logout()?;
//! # Ok(())
//! # }
//! ```

use crate::Result;
use crate::client::Client;
use crate::classify;
use crate::error::{ApiError, ErrorKind};
use crate::token::UserSummary;
use http::HeaderValue;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

const LOGIN_FAILED: &str = "Sign-in failed. Check your email and password.";

/// `Authorization` header value for a bearer token.
///
/// The value is marked sensitive so it is never printed by `Debug`.
pub(crate) fn bearer(token: &str) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|_| crate::Error::Internal("Stored token is not a valid header value".to_string()))?;
    value.set_sensitive(true);
    Ok(value)
}

/// A successful sign-in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Bearer token, already stored
    pub token: String,
    /// User summary, already stored when present
    pub user: Option<UserSummary>,
}

/// Team returned by team verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamInfo {
    /// Team name
    pub name: String,
    /// Team number
    #[serde(default)]
    pub team_number: Option<String>,
}

/// Outcome of a team number check
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TeamVerification {
    /// Whether the team exists and accepts registrations
    pub valid: bool,
    /// Name of the team, when found
    pub team_name: Option<String>,
    /// Full team details, when found
    pub team: Option<TeamInfo>,
    /// Reason the number was rejected
    pub error: Option<String>,
}

#[derive(Deserialize)]
struct VerifyTeamResponse {
    #[serde(default)]
    valid: bool,
    #[serde(default)]
    team: Option<TeamInfo>,
    #[serde(default)]
    error: Option<String>,
}

/// Sign-in, registration and sign-out
#[derive(Debug, Clone)]
pub struct AuthApi {
    client: Client,
}

impl AuthApi {
    /// Create the API over a client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Sign in and store the returned token and user summary
    pub async fn login(&self, email: &str, password: &str) -> std::result::Result<Session, ApiError> {
        let payload: Value = self
            .client
            .post("/api/login")
            .require_auth(false)
            .json(json!({ "email": email, "password": password }))?
            .send()
            .await?;

        let token = match payload.get("token").and_then(Value::as_str) {
            Some(token) if !token.trim().is_empty() => token.to_string(),
            _ => {
                let message = payload
                    .get("error")
                    .and_then(Value::as_str)
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or(LOGIN_FAILED);
                tracing::warn!("Login response did not contain a token");
                return Err(ApiError::new(
                    ErrorKind::ParseError,
                    200,
                    message,
                    classify::snippet(&payload.to_string()),
                ));
            }
        };

        let user = match payload.get("user") {
            Some(Value::Null) | None => None,
            Some(raw) => match serde_json::from_value::<UserSummary>(raw.clone()) {
                Ok(user) => Some(user),
                Err(e) => {
                    tracing::warn!("Ignoring malformed user summary in login response: {}", e);
                    None
                }
            },
        };

        let tokens = self.client.tokens();
        tokens.set_token(token.clone())?;
        match &user {
            Some(user) => tokens.set_user(user)?,
            None => tokens.clear_user()?,
        }
        tracing::debug!(has_user = user.is_some(), "Signed in");

        Ok(Session { token, user })
    }

    /// Create an account; the raw payload is returned
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        team_number: &str,
    ) -> std::result::Result<Value, ApiError> {
        self.client
            .post("/api/auth/register")
            .require_auth(false)
            .json(json!({
                "name": name,
                "email": email,
                "password": password,
                "teamNumber": team_number,
            }))?
            .send()
            .await
    }

    /// Check whether a team number can be registered against
    pub async fn verify_team(&self, team_number: &str) -> std::result::Result<TeamVerification, ApiError> {
        let response: VerifyTeamResponse = self
            .client
            .post("/api/auth/verify-team")
            .require_auth(false)
            .json(json!({ "teamNumber": team_number }))?
            .send()
            .await?;

        Ok(TeamVerification {
            valid: response.valid,
            team_name: response.team.as_ref().map(|t| t.name.clone()),
            team: response.team,
            error: response.error,
        })
    }

    /// Forget the stored token and user summary
    pub fn logout(&self) -> Result<()> {
        self.client.tokens().clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_header_is_sensitive() {
        let value = bearer("abc").unwrap();
        assert_eq!(value, "Bearer abc");
        assert!(value.is_sensitive());
    }

    #[test]
    fn bearer_rejects_control_characters() {
        assert!(bearer("abc\ndef").is_err());
    }

    #[test]
    fn logout_clears_session() {
        let client = Client::new("https://api.example.com").unwrap();
        client.tokens().set_token("abc").unwrap();
        client
            .tokens()
            .set_user(&UserSummary {
                name: Some("Ada".to_string()),
                ..Default::default()
            })
            .unwrap();

        AuthApi::new(client.clone()).logout().unwrap();
        assert!(!client.tokens().has_token());
        assert!(client.tokens().user().is_none());
    }
}
