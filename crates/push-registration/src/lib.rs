//! Push notification opt-in for the CropWatch client.
//!
//! Platform capabilities (permission prompt, background agent, push
//! subscription) are injected as traits; the backend association goes
//! through [`DeviceRegistry`].

mod classify;
mod error;
mod manager;
mod platform;
mod registry;

pub use classify::{is_channel_closed, is_effectively_complete, Completion, Expectation};
pub use error::{PushError, PushResult};
pub use manager::{PushConfig, PushRegistration, PushRegistrationManager, RegistrationOutcome};
pub use platform::{
    AgentRegistration, PermissionSource, PermissionState, PlatformError, PushPlatform,
};
pub use registry::{DeviceRegistry, HttpDeviceRegistry, DEVICE_PLATFORM};
