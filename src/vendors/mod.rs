use crate::domain::notification::MessageStatusReport;
use crate::domain::payment::{PaymentIntent, VendorPaymentStatus};
use crate::error::VendorError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

pub mod mailer;
pub mod mock;
pub mod payphone;
pub mod twilio;

const ERROR_BODY_LIMIT: usize = 500;

#[derive(Debug, Clone)]
pub enum VendorAuth {
    Bearer(String),
    Basic { username: String, password: String },
    None,
}

#[derive(Debug, Clone)]
pub enum VendorPayload {
    Json(Value),
    Form(Vec<(String, String)>),
}

#[derive(Debug, Clone)]
pub struct VendorResponse {
    pub status: u16,
    pub body: Value,
}

/// Thin HTTP adapter shared by every vendor integration: one call, one fixed
/// timeout, failures returned as [`VendorError`] and never retried.
#[derive(Clone)]
pub struct VendorClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl VendorClient {
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    pub async fn send(
        &self,
        endpoint: &str,
        payload: VendorPayload,
        auth: &VendorAuth,
    ) -> Result<VendorResponse, VendorError> {
        let req = self.client.post(endpoint);
        let req = match payload {
            VendorPayload::Json(body) => req.json(&body),
            VendorPayload::Form(fields) => req.form(&fields),
        };
        self.execute("POST", endpoint, req, auth).await
    }

    pub async fn fetch(&self, endpoint: &str, auth: &VendorAuth) -> Result<VendorResponse, VendorError> {
        let req = self.client.get(endpoint);
        self.execute("GET", endpoint, req, auth).await
    }

    async fn execute(
        &self,
        method: &str,
        endpoint: &str,
        req: reqwest::RequestBuilder,
        auth: &VendorAuth,
    ) -> Result<VendorResponse, VendorError> {
        let req = match auth {
            VendorAuth::Bearer(token) => req.bearer_auth(token),
            VendorAuth::Basic { username, password } => req.basic_auth(username, Some(password)),
            VendorAuth::None => req,
        };

        let start = Instant::now();
        let resp = req
            .header("Accept", "application/json")
            .timeout(self.timeout)
            .send()
            .await;
        let latency_ms = start.elapsed().as_millis() as u64;

        let resp = match resp {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(method, endpoint, latency_ms, timed_out = e.is_timeout(), "vendor call failed: {}", e);
                return Err(VendorError::Network {
                    timed_out: e.is_timeout(),
                    message: e.to_string(),
                });
            }
        };

        let status = resp.status();
        let text = resp.text().await.map_err(|e| VendorError::Network {
            timed_out: e.is_timeout(),
            message: e.to_string(),
        })?;
        tracing::info!(method, endpoint, status = status.as_u16(), latency_ms, "vendor call completed");

        if !status.is_success() {
            return Err(VendorError::Rejection {
                status: status.as_u16(),
                body: text.chars().take(ERROR_BODY_LIMIT).collect(),
            });
        }

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        Ok(VendorResponse {
            status: status.as_u16(),
            body,
        })
    }
}

pub fn string_field(body: &Value, key: &str) -> Option<String> {
    match body.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct VendorCheckout {
    pub payment_url: Option<String>,
    pub transaction_id: Option<String>,
    pub raw: Value,
}

#[derive(Debug, Clone)]
pub struct VendorConfirmation {
    pub status: VendorPaymentStatus,
    pub status_code: Option<i64>,
    pub transaction_status: Option<String>,
    pub raw: Value,
}

#[async_trait]
pub trait PaymentVendor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn create_payment(&self, intent: &PaymentIntent) -> Result<VendorCheckout, VendorError>;

    async fn confirm_payment(
        &self,
        transaction_id: &str,
        client_transaction_id: &str,
    ) -> Result<VendorConfirmation, VendorError>;
}

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub sid: String,
    pub status: String,
}

#[async_trait]
pub trait MessagingVendor: Send + Sync {
    /// Sends a pre-approved WhatsApp content template. `variables` is keyed by
    /// position (`"1"`, `"2"`, ...).
    async fn send_template(
        &self,
        to: &str,
        content_sid: &str,
        variables: &BTreeMap<String, String>,
    ) -> Result<SentMessage, VendorError>;

    async fn send_sms(&self, to: &str, body: &str) -> Result<SentMessage, VendorError>;

    async fn message_status(&self, sid: &str) -> Result<MessageStatusReport, VendorError>;
}

#[async_trait]
pub trait MailVendor: Send + Sync {
    async fn send_email(&self, to: &[String], subject: &str, body: &str) -> Result<Option<String>, VendorError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_field_reads_numbers_and_strings() {
        let body = json!({"transactionId": 123, "paymentUrl": "https://pay/x", "empty": ""});
        assert_eq!(string_field(&body, "transactionId").as_deref(), Some("123"));
        assert_eq!(string_field(&body, "paymentUrl").as_deref(), Some("https://pay/x"));
        assert_eq!(string_field(&body, "empty"), None);
        assert_eq!(string_field(&body, "missing"), None);
    }
}
