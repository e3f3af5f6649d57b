//! Delivery router error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RouterError {
    /// The platform refused to show a notification
    #[error("Notification display failed: {0}")]
    Display(String),

    /// Window lookup, focus, navigation or open failed
    #[error("Window operation failed: {0}")]
    Window(String),
}

pub type RouterResult<T> = Result<T, RouterError>;
