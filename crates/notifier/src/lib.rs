//! Transactional email delivery for appointment notifications.
//!
//! Application code calls [`Dispatcher::dispatch`] and moves on; delivery runs
//! in the background over SMTP with linear-backoff retries:
//! - validation (recipient, subject, credentials) happens before any I/O
//! - at most one transport session is open at a time
//! - sends are held to the provider's rate budget
//! - exhausted messages are logged under the `dead_letter` target and counted

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod message;
pub mod rate_limit;
pub mod retry;
pub mod smtp;
pub mod stats;
pub mod transport;

pub use config::MailerConfig;
pub use dispatcher::{DeliveryReport, Dispatcher};
pub use error::{DeliveryError, FailureKind, NotifierError};
pub use message::OutgoingMessage;
pub use retry::DispatchState;
pub use smtp::SmtpMailTransport;
pub use stats::{DispatchStats, StatsSnapshot};
pub use transport::MailTransport;
