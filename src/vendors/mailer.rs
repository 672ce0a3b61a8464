use crate::config::MailConfig;
use crate::error::VendorError;
use crate::vendors::{MailVendor, VendorAuth, VendorClient, VendorPayload};
use serde_json::json;

/// Plain-text mail through an HTTP relay speaking the SendGrid v3 format.
pub struct HttpMailer {
    pub api_url: String,
    pub api_key: String,
    pub from_address: String,
    pub client: VendorClient,
}

impl HttpMailer {
    pub fn new(cfg: &MailConfig, client: VendorClient) -> Self {
        Self {
            api_url: cfg.api_url.clone(),
            api_key: cfg.api_key.clone(),
            from_address: cfg.from_address.clone(),
            client,
        }
    }
}

#[async_trait::async_trait]
impl MailVendor for HttpMailer {
    async fn send_email(&self, to: &[String], subject: &str, body: &str) -> Result<Option<String>, VendorError> {
        let recipients: Vec<_> = to.iter().map(|email| json!({ "email": email })).collect();
        let payload = json!({
            "personalizations": [{ "to": recipients }],
            "from": { "email": self.from_address },
            "subject": subject,
            "content": [{ "type": "text/plain", "value": body }],
        });

        let resp = self
            .client
            .send(
                &self.api_url,
                VendorPayload::Json(payload),
                &VendorAuth::Bearer(self.api_key.clone()),
            )
            .await?;

        Ok(resp
            .body
            .get("id")
            .and_then(|v| v.as_str())
            .map(str::to_string))
    }
}
