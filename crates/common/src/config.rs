use serde::Deserialize;

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// SMTP account, also used as the sender address
    pub email_address: Option<String>,

    /// SMTP app password for `email_address`
    pub email_password: Option<String>,

    /// Display name on the `From` header (default: "Prescripto Admin")
    pub email_from_name: String,

    /// SMTP relay host (default: smtp.gmail.com)
    pub smtp_host: String,

    /// SMTP submission port, STARTTLS (default: 587)
    pub smtp_port: u16,

    /// TCP connect timeout in milliseconds (default: 10000)
    pub smtp_connection_timeout_ms: u64,

    /// Time allowed for the server greeting in milliseconds (default: 5000)
    pub smtp_greeting_timeout_ms: u64,

    /// Per-command socket timeout in milliseconds (default: 10000)
    pub smtp_socket_timeout_ms: u64,

    /// Retries after the first failed attempt (default: 3)
    pub email_max_retries: u32,

    /// Base retry delay in milliseconds; retry n waits n * base (default: 1000)
    pub email_retry_delay_ms: u64,

    /// Sends allowed per rate window (default: 5)
    pub email_rate_limit: u32,

    /// Rate window length in milliseconds (default: 20000)
    pub email_rate_window_ms: u64,

    /// HTTP listen port for the API server (default: 4000)
    pub api_port: u16,
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Missing email credentials are not an error here: the dispatcher rejects
    /// every request until they are configured.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            email_address: non_empty_var("EMAIL_ADDRESS"),
            email_password: non_empty_var("EMAIL_PASSWORD"),
            email_from_name: std::env::var("EMAIL_FROM_NAME")
                .unwrap_or_else(|_| "Prescripto Admin".to_string()),
            smtp_host: std::env::var("SMTP_HOST")
                .unwrap_or_else(|_| "smtp.gmail.com".to_string()),
            smtp_port: std::env::var("SMTP_PORT")
                .unwrap_or_else(|_| "587".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SMTP_PORT must be a valid u16"))?,
            smtp_connection_timeout_ms: std::env::var("SMTP_CONNECTION_TIMEOUT_MS")
                .unwrap_or_else(|_| "10000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SMTP_CONNECTION_TIMEOUT_MS must be a valid u64"))?,
            smtp_greeting_timeout_ms: std::env::var("SMTP_GREETING_TIMEOUT_MS")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SMTP_GREETING_TIMEOUT_MS must be a valid u64"))?,
            smtp_socket_timeout_ms: std::env::var("SMTP_SOCKET_TIMEOUT_MS")
                .unwrap_or_else(|_| "10000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SMTP_SOCKET_TIMEOUT_MS must be a valid u64"))?,
            email_max_retries: std::env::var("EMAIL_MAX_RETRIES")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("EMAIL_MAX_RETRIES must be a valid u32"))?,
            email_retry_delay_ms: std::env::var("EMAIL_RETRY_DELAY_MS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("EMAIL_RETRY_DELAY_MS must be a valid u64"))?,
            email_rate_limit: std::env::var("EMAIL_RATE_LIMIT")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("EMAIL_RATE_LIMIT must be a valid u32"))?,
            email_rate_window_ms: std::env::var("EMAIL_RATE_WINDOW_MS")
                .unwrap_or_else(|_| "20000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("EMAIL_RATE_WINDOW_MS must be a valid u64"))?,
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "4000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("API_PORT must be a valid u16"))?,
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            email_address: None,
            email_password: None,
            email_from_name: "Prescripto Admin".to_string(),
            smtp_host: "smtp.gmail.com".to_string(),
            smtp_port: 587,
            smtp_connection_timeout_ms: 10_000,
            smtp_greeting_timeout_ms: 5_000,
            smtp_socket_timeout_ms: 10_000,
            email_max_retries: 3,
            email_retry_delay_ms: 1_000,
            email_rate_limit: 5,
            email_rate_window_ms: 20_000,
            api_port: 4000,
        }
    }
}

/// Blank values are treated the same as unset ones.
fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
