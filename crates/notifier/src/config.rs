//! Mailer configuration derived once from [`AppConfig`] at process start.

use std::time::Duration;

use prescripto_common::config::AppConfig;

use crate::error::NotifierError;

/// Transport, retry and rate-limit settings shared by every dispatch.
#[derive(Debug, Clone)]
pub struct MailerConfig {
    pub address: Option<String>,
    pub password: Option<String>,
    pub from_name: String,
    pub host: String,
    pub port: u16,
    pub connection_timeout: Duration,
    pub greeting_timeout: Duration,
    pub socket_timeout: Duration,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub rate_limit: u32,
    pub rate_window: Duration,
}

/// Borrowed view of the SMTP account, present only when both halves are set.
#[derive(Debug, Clone, Copy)]
pub struct Credentials<'a> {
    pub address: &'a str,
    pub password: &'a str,
}

impl MailerConfig {
    pub fn with_credentials(
        mut self,
        address: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.address = Some(address.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_retry(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_base_delay = base_delay;
        self
    }

    pub fn with_rate_limit(mut self, limit: u32, window: Duration) -> Self {
        self.rate_limit = limit;
        self.rate_window = window;
        self
    }

    /// Fails with a validation error when either credential is missing.
    pub fn credentials(&self) -> Result<Credentials<'_>, NotifierError> {
        match (self.address.as_deref(), self.password.as_deref()) {
            (Some(address), Some(password)) => Ok(Credentials { address, password }),
            _ => Err(NotifierError::Validation(
                "Email configuration missing: EMAIL_ADDRESS or EMAIL_PASSWORD not set".to_string(),
            )),
        }
    }

    /// Upper bound for one whole send, covering connect, greeting and the
    /// SMTP dialogue.
    pub fn send_deadline(&self) -> Duration {
        self.connection_timeout + self.greeting_timeout + self.socket_timeout
    }
}

impl From<&AppConfig> for MailerConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            address: config.email_address.clone(),
            password: config.email_password.clone(),
            from_name: config.email_from_name.clone(),
            host: config.smtp_host.clone(),
            port: config.smtp_port,
            connection_timeout: Duration::from_millis(config.smtp_connection_timeout_ms),
            greeting_timeout: Duration::from_millis(config.smtp_greeting_timeout_ms),
            socket_timeout: Duration::from_millis(config.smtp_socket_timeout_ms),
            max_retries: config.email_max_retries,
            retry_base_delay: Duration::from_millis(config.email_retry_delay_ms),
            rate_limit: config.email_rate_limit,
            rate_window: Duration::from_millis(config.email_rate_window_ms),
        }
    }
}

impl Default for MailerConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}
