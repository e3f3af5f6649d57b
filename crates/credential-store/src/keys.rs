//! Storage key constants.

/// Keys shared by both persistence layers.
pub struct StorageKeys;

impl StorageKeys {
    /// The current Credential Record (JSON).
    pub const CREDENTIAL_RECORD: &'static str = "cropwatch.session";

    /// Cached push delivery token.
    pub const DELIVERY_TOKEN: &'static str = "cropwatch.push.delivery_token";
}
