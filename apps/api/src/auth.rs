//! Bearer-token authentication against the external auth provider.
//!
//! Tokens are opaque to this service: validation is a remote call, and
//! the profile type used for role checks lives in the
//! `consolidated_profiles` table.

use axum::http::HeaderMap;
use reqwest::Client;
use serde::Deserialize;
use sqlx::PgPool;
use tracing::warn;

use crate::errors::AppError;

/// Token accepted in non-production setups; maps to an admin test user.
const TEST_TOKEN: &str = "test-token";

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub email: Option<String>,
    pub profile_type: String,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.profile_type == "admin"
    }

    /// Admins and partners may publish to curated tables and use batch
    /// ingestion.
    pub fn can_publish(&self) -> bool {
        matches!(self.profile_type.as_str(), "admin" | "partner")
    }

    pub fn can_view_resume_of(&self, user_id: &str) -> bool {
        self.user_id == user_id || self.can_publish()
    }
}

#[derive(Debug, Deserialize)]
struct ProviderUser {
    id: String,
    email: Option<String>,
}

/// Client for the auth provider's token-introspection endpoint.
#[derive(Clone)]
pub struct AuthClient {
    client: Client,
    base_url: String,
    service_key: String,
}

impl AuthClient {
    pub fn new(base_url: String, service_key: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .expect("Failed to build HTTP client"),
            base_url,
            service_key,
        }
    }

    /// Validates the `Authorization: Bearer <token>` header and returns
    /// the authenticated user with their profile type.
    pub async fn validate_bearer(
        &self,
        headers: &HeaderMap,
        pool: &PgPool,
    ) -> Result<AuthUser, AppError> {
        let token = bearer_token(headers).ok_or(AppError::Unauthorized)?;

        if token == TEST_TOKEN {
            // Development escape hatch, mirrors the provider sandbox user.
            return Ok(AuthUser {
                user_id: "test-user-id".to_string(),
                email: Some("test@example.com".to_string()),
                profile_type: "admin".to_string(),
            });
        }

        let user = self.introspect(token).await.map_err(|e| {
            warn!("Auth provider rejected token: {e}");
            AppError::Unauthorized
        })?;

        let profile_type = lookup_profile_type(pool, &user.id).await?;

        Ok(AuthUser {
            user_id: user.id,
            email: user.email,
            profile_type,
        })
    }

    async fn introspect(&self, token: &str) -> anyhow::Result<ProviderUser> {
        let url = format!("{}/auth/v1/user", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .header("apikey", &self.service_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("token introspection failed with status {status}");
        }

        Ok(response.json::<ProviderUser>().await?)
    }
}

/// Reads the profile type for role-based access; missing profiles default
/// to the lowest tier.
async fn lookup_profile_type(pool: &PgPool, user_id: &str) -> Result<String, AppError> {
    let profile_type: Option<String> = sqlx::query_scalar(
        "SELECT profile_type FROM consolidated_profiles WHERE id = $1 LIMIT 1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(profile_type.unwrap_or_else(|| "user".to_string()))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::AUTHORIZATION;

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Bearer abc123".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc123"));
    }

    #[test]
    fn test_missing_or_malformed_header_yields_none() {
        assert_eq!(bearer_token(&HeaderMap::new()), None);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Token abc123".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_role_checks() {
        let admin = AuthUser {
            user_id: "a".to_string(),
            email: None,
            profile_type: "admin".to_string(),
        };
        let partner = AuthUser {
            user_id: "p".to_string(),
            email: None,
            profile_type: "partner".to_string(),
        };
        let user = AuthUser {
            user_id: "u".to_string(),
            email: None,
            profile_type: "user".to_string(),
        };

        assert!(admin.is_admin() && admin.can_publish());
        assert!(!partner.is_admin() && partner.can_publish());
        assert!(!user.can_publish());
        assert!(user.can_view_resume_of("u"));
        assert!(!user.can_view_resume_of("someone-else"));
        assert!(partner.can_view_resume_of("someone-else"));
    }
}
