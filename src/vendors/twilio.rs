use crate::config::TwilioConfig;
use crate::domain::notification::{DeliveryStatus, MessageStatusReport};
use crate::error::VendorError;
use crate::vendors::{string_field, MessagingVendor, SentMessage, VendorAuth, VendorClient, VendorPayload};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

const ERROR_HINTS: [(i64, &str); 8] = [
    (21211, "invalid 'To' phone number"),
    (21408, "sending to this region is not enabled on the account"),
    (21608, "recipient is not in the allowed test list of a trial account"),
    (21656, "content variables are invalid or do not match the template"),
    (63015, "recipient has not joined the WhatsApp sandbox"),
    (63016, "free-form message outside the 24h window, an approved template is required"),
    (63027, "template not approved or content sid invalid"),
    (63112, "WhatsApp business account disabled by Meta"),
];

pub fn error_hint(code: i64) -> Option<&'static str> {
    ERROR_HINTS.iter().find(|(c, _)| *c == code).map(|(_, hint)| *hint)
}

pub fn rejection_code(e: &VendorError) -> Option<i64> {
    match e {
        VendorError::Rejection { body, .. } => serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| v.get("code").and_then(Value::as_i64)),
        _ => None,
    }
}

pub struct TwilioMessaging {
    pub account_sid: String,
    pub auth_token: String,
    pub api_base_url: String,
    pub content_base_url: String,
    pub whatsapp_from: String,
    pub sms_from: String,
    pub client: VendorClient,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountReport {
    pub sid: String,
    pub friendly_name: Option<String>,
    pub status: Option<String>,
    pub account_type: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContentTemplateReport {
    pub sid: String,
    pub friendly_name: Option<String>,
    pub variable_count: usize,
    pub whatsapp_approval: Option<String>,
}

impl TwilioMessaging {
    pub fn new(cfg: &TwilioConfig, client: VendorClient) -> Self {
        Self {
            account_sid: cfg.account_sid.clone(),
            auth_token: cfg.auth_token.clone(),
            api_base_url: cfg.api_base_url.trim_end_matches('/').to_string(),
            content_base_url: cfg.content_base_url.trim_end_matches('/').to_string(),
            whatsapp_from: cfg.whatsapp_from.clone(),
            sms_from: cfg.sms_from.clone(),
            client,
        }
    }

    fn auth(&self) -> VendorAuth {
        VendorAuth::Basic {
            username: self.account_sid.clone(),
            password: self.auth_token.clone(),
        }
    }

    fn account_url(&self) -> String {
        format!("{}/2010-04-01/Accounts/{}", self.api_base_url, self.account_sid)
    }

    fn messages_url(&self) -> String {
        format!("{}/Messages.json", self.account_url())
    }

    async fn create_message(&self, fields: Vec<(String, String)>) -> Result<SentMessage, VendorError> {
        let resp = self
            .client
            .send(&self.messages_url(), VendorPayload::Form(fields), &self.auth())
            .await?;
        let sid = string_field(&resp.body, "sid")
            .ok_or_else(|| VendorError::Decode("message response without sid".to_string()))?;
        Ok(SentMessage {
            sid,
            status: string_field(&resp.body, "status").unwrap_or_else(|| "queued".to_string()),
        })
    }

    pub async fn account_status(&self) -> Result<AccountReport, VendorError> {
        let resp = self
            .client
            .fetch(&format!("{}.json", self.account_url()), &self.auth())
            .await?;
        Ok(AccountReport {
            sid: string_field(&resp.body, "sid").unwrap_or_else(|| self.account_sid.clone()),
            friendly_name: string_field(&resp.body, "friendly_name"),
            status: string_field(&resp.body, "status"),
            account_type: string_field(&resp.body, "type"),
        })
    }

    pub async fn content_template(&self, content_sid: &str) -> Result<ContentTemplateReport, VendorError> {
        let resp = self
            .client
            .fetch(&format!("{}/v1/Content/{}", self.content_base_url, content_sid), &self.auth())
            .await?;
        let variable_count = resp
            .body
            .get("variables")
            .and_then(Value::as_object)
            .map(|m| m.len())
            .unwrap_or(0);

        let approval = self
            .client
            .fetch(
                &format!("{}/v1/Content/{}/ApprovalRequests", self.content_base_url, content_sid),
                &self.auth(),
            )
            .await
            .ok()
            .and_then(|r| {
                r.body
                    .get("whatsapp")
                    .and_then(|w| w.get("status"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            });

        Ok(ContentTemplateReport {
            sid: content_sid.to_string(),
            friendly_name: string_field(&resp.body, "friendly_name"),
            variable_count,
            whatsapp_approval: approval,
        })
    }

    pub async fn recent_messages(&self, limit: u32) -> Result<Vec<MessageStatusReport>, VendorError> {
        let resp = self
            .client
            .fetch(&format!("{}?PageSize={}", self.messages_url(), limit), &self.auth())
            .await?;
        Ok(resp
            .body
            .get("messages")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(status_report).collect())
            .unwrap_or_default())
    }
}

pub fn status_report(body: &Value) -> MessageStatusReport {
    let raw_status = string_field(body, "status").unwrap_or_else(|| "unknown".to_string());
    let error_code = body.get("error_code").and_then(|v| match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse::<i64>().ok(),
        _ => None,
    });
    MessageStatusReport {
        sid: string_field(body, "sid").unwrap_or_default(),
        status: DeliveryStatus::parse(&raw_status),
        raw_status,
        to: string_field(body, "to"),
        from: string_field(body, "from"),
        error_code,
        error_message: string_field(body, "error_message"),
        error_hint: error_code.and_then(error_hint),
        price: string_field(body, "price"),
        price_unit: string_field(body, "price_unit"),
        date_sent: string_field(body, "date_sent"),
        date_updated: string_field(body, "date_updated"),
    }
}

#[async_trait::async_trait]
impl MessagingVendor for TwilioMessaging {
    async fn send_template(
        &self,
        to: &str,
        content_sid: &str,
        variables: &BTreeMap<String, String>,
    ) -> Result<SentMessage, VendorError> {
        // Twilio expects ContentVariables as a JSON string, not form fields.
        let content_variables = serde_json::to_string(variables)
            .map_err(|e| VendorError::Decode(e.to_string()))?;
        self.create_message(vec![
            ("From".to_string(), self.whatsapp_from.clone()),
            ("To".to_string(), to.to_string()),
            ("ContentSid".to_string(), content_sid.to_string()),
            ("ContentVariables".to_string(), content_variables),
        ])
        .await
    }

    async fn send_sms(&self, to: &str, body: &str) -> Result<SentMessage, VendorError> {
        self.create_message(vec![
            ("From".to_string(), self.sms_from.clone()),
            ("To".to_string(), to.to_string()),
            ("Body".to_string(), body.to_string()),
        ])
        .await
    }

    async fn message_status(&self, sid: &str) -> Result<MessageStatusReport, VendorError> {
        let resp = self
            .client
            .fetch(&format!("{}/Messages/{}.json", self.account_url(), sid), &self.auth())
            .await?;
        Ok(status_report(&resp.body))
    }
}
