use async_trait::async_trait;

use crate::error::DeliveryError;
use crate::message::OutgoingMessage;

/// A mail delivery backend.
///
/// One call to `send` is one transport session. The dispatcher guarantees
/// that at most one session is open at a time, so implementations need no
/// concurrency limiting of their own.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Deliver `message`, returning a short summary of the server's reply.
    async fn send(&self, message: &OutgoingMessage) -> Result<String, DeliveryError>;
}
