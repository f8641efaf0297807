use std::fmt;
use thiserror::Error;

use crate::frame::Frame;

/// Errors returned by `StompClient` operations.
///
/// Protocol failures reported by the server never show up here; they are
/// delivered to the error handler registered with `StompClient::on_error`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Every subscription slot is occupied.
    #[error("subscription table full ({capacity} slots in use)")]
    SubscriptionsFull { capacity: usize },
    /// The id does not name an occupied subscription slot.
    #[error("unknown subscription id: {0}")]
    UnknownSubscription(usize),
}

/// A server-sent ERROR frame with its commonly used headers pulled out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerError {
    /// The `message` header, or "unknown error" when the server sent none.
    pub message: String,
    /// Frame body, if any.
    pub body: Option<String>,
    /// The `receipt-id` header, if the error answers a receipted frame.
    pub receipt_id: Option<String>,
    /// The ERROR frame as received.
    pub frame: Frame,
}

impl ServerError {
    pub fn from_frame(frame: &Frame) -> Self {
        let message = frame
            .headers
            .find("message")
            .unwrap_or("unknown error")
            .to_string();
        let body = if frame.body.is_empty() {
            None
        } else {
            Some(frame.body.clone())
        };
        let receipt_id = frame.headers.find("receipt-id").map(str::to_string);
        Self {
            message,
            body,
            receipt_id,
            frame: frame.clone(),
        }
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "server error: {}", self.message)?;
        if let Some(body) = &self.body {
            write!(f, " ({})", body.trim_end())?;
        }
        Ok(())
    }
}

impl std::error::Error for ServerError {}
