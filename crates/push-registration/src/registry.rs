//! Backend association of delivery tokens.

use async_trait::async_trait;
use serde::Serialize;
use session_auth::{check_response, transport_error, ApiClient, AuthResult};
use tracing::debug;

/// Platform label sent with every device registration.
pub const DEVICE_PLATFORM: &str = "web";

/// Associates delivery tokens with the signed-in user.
#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    async fn register(&self, access_token: &str, delivery_token: &str) -> AuthResult<()>;

    async fn unregister(&self, access_token: &str, delivery_token: &str) -> AuthResult<()>;
}

#[derive(Serialize)]
struct RegisterDeviceRequest<'a> {
    token: &'a str,
    platform: &'a str,
}

#[derive(Serialize)]
struct UnregisterDeviceRequest<'a> {
    token: &'a str,
}

/// reqwest-backed [`DeviceRegistry`].
#[derive(Clone)]
pub struct HttpDeviceRegistry {
    client: ApiClient,
}

impl HttpDeviceRegistry {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DeviceRegistry for HttpDeviceRegistry {
    async fn register(&self, access_token: &str, delivery_token: &str) -> AuthResult<()> {
        debug!("Registering delivery token with backend");
        let response = self
            .client
            .http()
            .post(self.client.url("/notifications/devices"))
            .bearer_auth(access_token)
            .json(&RegisterDeviceRequest {
                token: delivery_token,
                platform: DEVICE_PLATFORM,
            })
            .send()
            .await
            .map_err(transport_error)?;
        check_response(response, "register device", None).await?;
        Ok(())
    }

    async fn unregister(&self, access_token: &str, delivery_token: &str) -> AuthResult<()> {
        debug!("Unregistering delivery token");
        let response = self
            .client
            .http()
            .delete(self.client.url("/notifications/devices"))
            .bearer_auth(access_token)
            .json(&UnregisterDeviceRequest {
                token: delivery_token,
            })
            .send()
            .await
            .map_err(transport_error)?;
        check_response(response, "unregister device", None).await?;
        Ok(())
    }
}
