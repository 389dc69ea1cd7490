//! Client for the user service
//!
//! Registration creates the public profile in the user service before the
//! local credential exists; profile ownership of the identity id keeps the
//! two services agreeing on who a user is.

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

/// Request timeout for user-service calls
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Error from the user service
#[derive(Error, Debug)]
pub enum UserClientError {
    /// The user service answered with a failure status
    #[error("User service returned {status}: {detail}")]
    Status { status: StatusCode, detail: String },

    /// The user service could not be reached
    #[error("User service unreachable: {0}")]
    Unreachable(String),
}

/// Public profile as the user service reports it
#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub is_active: bool,
}

/// User service client configuration
#[derive(Debug, Clone)]
pub struct UserClientConfig {
    /// Base URL of the user service
    pub base_url: String,
}

impl UserClientConfig {
    /// Create a new UserClientConfig from environment variables
    ///
    /// # Environment Variables
    /// - `USER_SERVICE_URL`: Base URL (default: "http://localhost:8002")
    pub fn from_env() -> anyhow::Result<Self> {
        let base_url = std::env::var("USER_SERVICE_URL")
            .unwrap_or_else(|_| "http://localhost:8002".to_string());
        Ok(UserClientConfig { base_url })
    }
}

/// User service client
#[derive(Clone)]
pub struct UserClient {
    client: reqwest::Client,
    base_url: String,
}

impl UserClient {
    /// Create a new user service client
    pub fn new(config: &UserClientConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(UserClient {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create the public profile for a registering user
    pub async fn create_profile(
        &self,
        username: &str,
        email: &str,
        display_name: Option<&str>,
    ) -> Result<UserProfile, UserClientError> {
        let url = format!("{}/api/v1/users/internal/create-profile", self.base_url);
        let payload = json!({
            "username": username,
            "display_name": display_name,
            "email": email,
        });

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!("Request error creating user profile: {}", e);
                UserClientError::Unreachable(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = extract_detail(response).await;
            error!("User service rejected profile creation: {} - {}", status, detail);
            return Err(UserClientError::Status { status, detail });
        }

        response.json::<UserProfile>().await.map_err(|e| {
            error!("Malformed profile response from user service: {}", e);
            UserClientError::Unreachable(e.to_string())
        })
    }
}

/// Pull a human-readable detail out of an error response body
async fn extract_detail(response: reqwest::Response) -> String {
    if response.status() == StatusCode::INTERNAL_SERVER_ERROR {
        return "Internal server error".to_string();
    }
    match response.json::<serde_json::Value>().await {
        Ok(body) => body
            .get("error")
            .or_else(|| body.get("detail"))
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown error")
            .to_string(),
        Err(_) => "Unknown error".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_service_maps_to_unreachable_error() {
        let config = UserClientConfig {
            base_url: "http://127.0.0.1:1".to_string(),
        };
        let client = UserClient::new(&config).unwrap();

        let result = client
            .create_profile("alice", "alice@example.com", None)
            .await;
        assert!(matches!(result, Err(UserClientError::Unreachable(_))));
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let config = UserClientConfig {
            base_url: "http://users.internal/".to_string(),
        };
        let client = UserClient::new(&config).unwrap();
        assert_eq!(client.base_url, "http://users.internal");
    }
}
