//! Request validation and normalisation into the message handed to a transport.

use prescripto_common::types::MessageRequest;

use crate::config::MailerConfig;
use crate::error::NotifierError;

/// A validated, fully populated message ready for a [`crate::MailTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub from_name: String,
    pub from_address: String,
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: Option<String>,
}

impl OutgoingMessage {
    /// Validate `request` against `config` and fill in derived fields.
    ///
    /// Fails before any I/O if the recipient or subject is blank, or if the
    /// SMTP credentials are not configured.
    pub fn prepare(request: &MessageRequest, config: &MailerConfig) -> Result<Self, NotifierError> {
        let to = request.recipient.trim();
        let subject = request.subject.trim();
        if to.is_empty() || subject.is_empty() {
            return Err(NotifierError::Validation(
                "Missing required fields: 'recipient' or 'subject'".to_string(),
            ));
        }

        let credentials = config.credentials()?;

        let html = request.html_body.as_deref().filter(|h| !h.is_empty());
        let text = match request.text_body.as_deref().filter(|t| !t.is_empty()) {
            Some(text) => text.to_string(),
            None => strip_markup(html.unwrap_or_default()),
        };

        Ok(Self {
            from_name: config.from_name.clone(),
            from_address: credentials.address.to_string(),
            to: to.to_string(),
            subject: subject.to_string(),
            text,
            html: html.map(str::to_string),
        })
    }
}

/// Remove every `<...>` run with a non-empty body, leftmost first. An empty
/// `<>` and an unterminated `<` are kept as text.
pub fn strip_markup(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('>') {
            Some(close) if close > 0 => rest = &after[close + 1..],
            _ => {
                out.push('<');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
