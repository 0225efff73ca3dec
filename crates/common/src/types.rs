use serde::{Deserialize, Serialize};

/// A transactional email requested by application code (e.g. an appointment
/// confirmation handler).
///
/// Missing JSON fields deserialize to empty values so that the dispatcher, not
/// the extractor, decides what is invalid. Unknown fields are rejected so a
/// misspelled body key cannot silently drop the body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MessageRequest {
    /// Recipient email address
    #[serde(default, alias = "to")]
    pub recipient: String,
    /// Subject line
    #[serde(default)]
    pub subject: String,
    /// Plain text body; derived from `html_body` when absent
    #[serde(default, alias = "text", alias = "textBody")]
    pub text_body: Option<String>,
    /// HTML body
    #[serde(default, alias = "html", alias = "htmlBody")]
    pub html_body: Option<String>,
}

impl MessageRequest {
    pub fn new(recipient: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            subject: subject.into(),
            text_body: None,
            html_body: None,
        }
    }

    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.text_body = Some(body.into());
        self
    }

    pub fn html(mut self, body: impl Into<String>) -> Self {
        self.html_body = Some(body.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_deserialize_empty() {
        let req: MessageRequest = serde_json::from_value(serde_json::json!({
            "html": "<p>Hi</p>"
        }))
        .unwrap();
        assert!(req.recipient.is_empty());
        assert!(req.subject.is_empty());
        assert_eq!(req.text_body, None);
        assert_eq!(req.html_body.as_deref(), Some("<p>Hi</p>"));
    }

    #[test]
    fn test_camel_case_body_keys() {
        let req: MessageRequest = serde_json::from_value(serde_json::json!({
            "recipient": "pat@example.com",
            "subject": "s",
            "textBody": "hello",
            "htmlBody": "<p>x</p>"
        }))
        .unwrap();
        assert_eq!(req.text_body.as_deref(), Some("hello"));
        assert_eq!(req.html_body.as_deref(), Some("<p>x</p>"));
    }

    #[test]
    fn test_to_is_recipient() {
        let req: MessageRequest = serde_json::from_value(serde_json::json!({
            "to": "pat@example.com",
            "subject": "s"
        }))
        .unwrap();
        assert_eq!(req.recipient, "pat@example.com");
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = serde_json::from_value::<MessageRequest>(serde_json::json!({
            "recipient": "pat@example.com",
            "subject": "s",
            "htmlbody": "<p>x</p>"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_builder() {
        let req = MessageRequest::new("pat@example.com", "Appointment booked").text("See you");
        assert_eq!(req.recipient, "pat@example.com");
        assert_eq!(req.text_body.as_deref(), Some("See you"));
        assert!(req.html_body.is_none());
    }
}
