//! Backend authentication endpoints.
//!
//! `AuthApi` is the seam the session manager talks through; `HttpAuthApi`
//! is the reqwest implementation against the CropWatch REST API.

use crate::{AuthError, AuthResult};
use async_trait::async_trait;
use credential_store::UserProfile;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};
use url::Url;

/// Error code the backend sends with a 403 for unconfirmed accounts.
pub const EMAIL_NOT_VERIFIED: &str = "EMAIL_NOT_VERIFIED";

/// Login form.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
    pub remember_me: bool,
}

/// Successful login response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub user: UserProfile,
}

/// Successful refresh response. The user is optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    #[serde(default)]
    pub user: Option<UserProfile>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Serialize)]
struct EmailRequest<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct ResetPasswordRequest<'a> {
    token: &'a str,
    password: &'a str,
}

/// Authentication endpoints used by the session manager.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, credentials: &LoginCredentials) -> AuthResult<LoginResponse>;

    /// Exchange the current access token for a fresh one.
    async fn refresh_token(&self, access_token: &str) -> AuthResult<RefreshResponse>;

    async fn logout(&self, access_token: &str) -> AuthResult<()>;

    async fn resend_verification(&self, email: &str) -> AuthResult<()>;

    async fn request_password_reset(&self, email: &str) -> AuthResult<()>;

    async fn reset_password(&self, token: &str, new_password: &str) -> AuthResult<()>;
}

/// Map a non-success status and its body to an error.
///
/// `email` fills in the verification address when the body omits it.
pub fn error_for_status(status: u16, body: &str, email: Option<&str>) -> AuthError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();

    if status == StatusCode::UNAUTHORIZED.as_u16() {
        return AuthError::Unauthorized;
    }
    if status == StatusCode::FORBIDDEN.as_u16() && parsed.code.as_deref() == Some(EMAIL_NOT_VERIFIED)
    {
        return AuthError::VerificationRequired {
            email: parsed
                .email
                .or_else(|| email.map(str::to_string))
                .unwrap_or_default(),
        };
    }

    let message = parsed.message.unwrap_or_else(|| {
        if body.trim().is_empty() {
            StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("request failed")
                .to_string()
        } else {
            body.to_string()
        }
    });
    AuthError::Api { status, message }
}

/// Classify a reqwest transport failure.
pub fn transport_error(e: reqwest::Error) -> AuthError {
    if e.is_timeout() {
        AuthError::Timeout
    } else if e.is_connect() || e.is_request() {
        AuthError::NetworkUnavailable
    } else {
        AuthError::Http(e)
    }
}

/// Turn a response into an error unless it is a success.
pub async fn check_response(
    response: Response,
    context: &str,
    email: Option<&str>,
) -> AuthResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    error!(status = %status, context, "Backend request failed");
    Err(error_for_status(status.as_u16(), &body, email))
}

/// Shared reqwest client plus base URL for the CropWatch backend.
#[derive(Clone)]
pub struct ApiClient {
    http_client: Client,
    base_url: String,
}

impl ApiClient {
    /// Build a client with a per-request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> AuthResult<Self> {
        Url::parse(base_url)?;
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn http(&self) -> &Client {
        &self.http_client
    }
}

/// reqwest-backed [`AuthApi`].
#[derive(Clone)]
pub struct HttpAuthApi {
    client: ApiClient,
}

impl HttpAuthApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    async fn post_unauthenticated<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        email: Option<&str>,
    ) -> AuthResult<Response> {
        debug!(path, "POST");
        let response = self
            .client
            .http()
            .post(self.client.url(path))
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        check_response(response, path, email).await
    }

    async fn post_bearer(&self, path: &str, access_token: &str) -> AuthResult<Response> {
        debug!(path, "POST (bearer)");
        let response = self
            .client
            .http()
            .post(self.client.url(path))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(transport_error)?;
        check_response(response, path, None).await
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn login(&self, credentials: &LoginCredentials) -> AuthResult<LoginResponse> {
        let response = self
            .post_unauthenticated("/auth/login", credentials, Some(&credentials.email))
            .await
            .map_err(|e| match e {
                AuthError::Unauthorized => {
                    AuthError::InvalidCredentials("Invalid email or password".to_string())
                }
                other => other,
            })?;
        Ok(response.json().await?)
    }

    async fn refresh_token(&self, access_token: &str) -> AuthResult<RefreshResponse> {
        let response = self.post_bearer("/auth/refresh-token", access_token).await?;
        Ok(response.json().await?)
    }

    async fn logout(&self, access_token: &str) -> AuthResult<()> {
        self.post_bearer("/auth/logout", access_token).await?;
        Ok(())
    }

    async fn resend_verification(&self, email: &str) -> AuthResult<()> {
        self.post_unauthenticated(
            "/auth/resend-verification",
            &EmailRequest { email },
            Some(email),
        )
        .await?;
        Ok(())
    }

    async fn request_password_reset(&self, email: &str) -> AuthResult<()> {
        self.post_unauthenticated("/auth/forgot-password", &EmailRequest { email }, None)
            .await?;
        Ok(())
    }

    async fn reset_password(&self, token: &str, new_password: &str) -> AuthResult<()> {
        self.post_unauthenticated(
            "/auth/reset-password",
            &ResetPasswordRequest {
                token,
                password: new_password,
            },
            None,
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_401_maps_to_unauthorized() {
        assert!(matches!(
            error_for_status(401, "", None),
            AuthError::Unauthorized
        ));
    }

    #[test]
    fn test_unverified_email_is_distinct() {
        let err = error_for_status(
            403,
            r#"{"message":"Please verify","code":"EMAIL_NOT_VERIFIED"}"#,
            Some("farmer@example.com"),
        );
        match err {
            AuthError::VerificationRequired { email } => assert_eq!(email, "farmer@example.com"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_plain_403_is_api_error() {
        let err = error_for_status(403, r#"{"message":"Forbidden resource"}"#, None);
        assert!(matches!(
            err,
            AuthError::Api { status: 403, ref message } if message == "Forbidden resource"
        ));
    }

    #[test]
    fn test_empty_body_uses_reason_phrase() {
        let err = error_for_status(503, "", None);
        assert!(matches!(
            err,
            AuthError::Api { status: 503, ref message } if message == "Service Unavailable"
        ));
    }

    #[test]
    fn test_login_body_is_camel_case() {
        let body = serde_json::to_value(LoginCredentials {
            email: "a@b.c".to_string(),
            password: "pw".to_string(),
            remember_me: true,
        })
        .unwrap();
        assert_eq!(body["rememberMe"], true);
    }

    #[test]
    fn test_refresh_response_without_user() {
        let parsed: RefreshResponse = serde_json::from_str(r#"{"accessToken":"t2"}"#).unwrap();
        assert_eq!(parsed.access_token, "t2");
        assert!(parsed.user.is_none());
    }

    #[test]
    fn test_api_client_rejects_bad_url() {
        assert!(matches!(
            ApiClient::new("not a url", Duration::from_secs(1)),
            Err(AuthError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_api_client_joins_paths() {
        let client = ApiClient::new("https://api.example.test/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.url("/auth/login"), "https://api.example.test/auth/login");
    }
}
