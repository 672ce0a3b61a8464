use crate::config::MessagingTransport;
use crate::domain::notification::{
    DeliveryLogEntry, DeliveryResult, MessageStatusReport, NotificationEvent, RecipientRole, Transport,
};
use crate::domain::phone::{to_e164, whatsapp_address};
use crate::domain::ports::DeliveryLog;
use crate::error::{DispatchError, VendorError};
use crate::notifications::templates::{render, MessageTemplate, TemplateCatalog, WhatsAppTemplate};
use crate::vendors::twilio::{error_hint, rejection_code};
use crate::vendors::{MailVendor, MessagingVendor};
use chrono::Utc;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const TEST_MODE_MESSAGE_ID: &str = "TEST_MODE";

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub transport: MessagingTransport,
    pub test_mode: bool,
    pub admin_emails: Vec<String>,
}

#[derive(Clone)]
pub struct NotificationDispatch {
    pub catalog: Arc<TemplateCatalog>,
    pub messaging: Arc<dyn MessagingVendor>,
    pub mailer: Arc<dyn MailVendor>,
    pub log: Arc<dyn DeliveryLog>,
    pub settings: DispatchSettings,
}

enum Route<'a> {
    WhatsApp { to: String, template: &'a WhatsAppTemplate },
    Sms { to: String, body: &'static str },
    Email { to: Vec<String> },
}

impl NotificationDispatch {
    pub fn new(
        catalog: Arc<TemplateCatalog>,
        messaging: Arc<dyn MessagingVendor>,
        mailer: Arc<dyn MailVendor>,
        log: Arc<dyn DeliveryLog>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            catalog,
            messaging,
            mailer,
            log,
            settings,
        }
    }

    /// Renders and sends one event over a single transport. Vendor rejections
    /// come back as a not-accepted [`DeliveryResult`]; transport failures and
    /// bad input are errors. Nothing is retried.
    pub async fn dispatch(&self, event: &NotificationEvent) -> Result<DeliveryResult, DispatchError> {
        let template = self.catalog.get(&event.template_key).ok_or_else(|| {
            DispatchError::Configuration(format!("unknown template {}", event.template_key))
        })?;

        match self.route(event, template)? {
            Route::WhatsApp { to, template: wa } => {
                let variables = positional_variables(&event.template_key, wa, &event.variables)?;
                if self.settings.test_mode {
                    return Ok(self.test_mode_result(event, Transport::WhatsApp, to).await);
                }
                let sent = self.messaging.send_template(&to, &wa.content_sid, &variables).await;
                self.finish(event, Transport::WhatsApp, to, sent.map(|m| (Some(m.sid), Some(m.status))))
                    .await
            }
            Route::Sms { to, body } => {
                let text = render(body, &event.variables).map_err(missing_variable)?;
                if self.settings.test_mode {
                    return Ok(self.test_mode_result(event, Transport::Sms, to).await);
                }
                let sent = self.messaging.send_sms(&to, &text).await;
                self.finish(event, Transport::Sms, to, sent.map(|m| (Some(m.sid), Some(m.status))))
                    .await
            }
            Route::Email { to } => {
                let email = template.email.as_ref().ok_or_else(|| {
                    DispatchError::Configuration(format!("template {} has no email body", event.template_key))
                })?;
                let subject = render(email.subject, &event.variables).map_err(missing_variable)?;
                let body = render(email.body, &event.variables).map_err(missing_variable)?;
                let sent = self.mailer.send_email(&to, &subject, &body).await;
                self.finish(event, Transport::Email, to.join(","), sent.map(|id| (id, None)))
                    .await
            }
        }
    }

    /// Fire-and-forget variant used by the payment flow: failures are logged
    /// and never reach the caller.
    pub async fn notify(&self, event: NotificationEvent) {
        match self.dispatch(&event).await {
            Ok(result) if result.accepted => {
                tracing::info!(
                    template = %event.template_key,
                    transport = result.transport.as_str(),
                    message_id = ?result.message_id,
                    "notification sent"
                );
            }
            Ok(result) => {
                tracing::warn!(
                    template = %event.template_key,
                    transport = result.transport.as_str(),
                    error_code = ?result.error_code,
                    "notification rejected: {}",
                    result.error_message.unwrap_or_default()
                );
            }
            Err(e) => {
                tracing::warn!(template = %event.template_key, kind = ?e.kind(), "notification not sent: {}", e);
            }
        }
    }

    pub async fn message_status(&self, sid: &str) -> Result<MessageStatusReport, DispatchError> {
        let report = self.messaging.message_status(sid).await?;
        let detail = report
            .error_message
            .as_deref()
            .or(report.error_hint);
        self.log.update_status(sid, report.status, detail).await?;
        Ok(report)
    }

    fn route<'a>(&self, event: &NotificationEvent, template: &'a MessageTemplate) -> Result<Route<'a>, DispatchError> {
        let phone = event.recipient.phone.as_deref().filter(|p| !p.trim().is_empty());
        // A WhatsApp template without a content sid falls back to email.
        let mut unconfigured = None;
        if let Some(phone) = phone {
            match self.settings.transport {
                MessagingTransport::WhatsApp => match &template.whatsapp {
                    Some(wa) if wa.is_configured() => {
                        return Ok(Route::WhatsApp {
                            to: whatsapp_address(phone),
                            template: wa,
                        });
                    }
                    Some(_) => {
                        tracing::warn!(template = %event.template_key, "content sid not configured, using email");
                        unconfigured = Some(format!(
                            "content sid for template {} is not configured",
                            event.template_key
                        ));
                    }
                    None => {}
                },
                MessagingTransport::Sms => {
                    if let Some(body) = template.sms {
                        return Ok(Route::Sms {
                            to: to_e164(phone),
                            body,
                        });
                    }
                }
            }
        }

        let to = match event.recipient.email.as_deref().filter(|e| !e.trim().is_empty()) {
            Some(email) => vec![email.to_string()],
            None if event.recipient_role == RecipientRole::Admin => self.settings.admin_emails.clone(),
            None => Vec::new(),
        };
        if to.is_empty() {
            if let Some(reason) = unconfigured {
                return Err(DispatchError::Configuration(reason));
            }
            return Err(DispatchError::Validation(format!(
                "no deliverable address for template {}",
                event.template_key
            )));
        }
        Ok(Route::Email { to })
    }

    async fn test_mode_result(&self, event: &NotificationEvent, transport: Transport, to: String) -> DeliveryResult {
        tracing::info!(template = %event.template_key, to = %to, "messaging test mode, message not sent");
        let result = DeliveryResult {
            transport,
            accepted: true,
            recipient: to,
            message_id: Some(TEST_MODE_MESSAGE_ID.to_string()),
            vendor_status: Some("test_mode".to_string()),
            error_code: None,
            error_message: None,
        };
        self.record(event, &result).await;
        result
    }

    async fn finish(
        &self,
        event: &NotificationEvent,
        transport: Transport,
        recipient: String,
        sent: Result<(Option<String>, Option<String>), VendorError>,
    ) -> Result<DeliveryResult, DispatchError> {
        let result = match sent {
            Ok((message_id, vendor_status)) => DeliveryResult {
                transport,
                accepted: true,
                recipient,
                message_id,
                vendor_status,
                error_code: None,
                error_message: None,
            },
            Err(e @ VendorError::Network { .. }) => {
                let failed = DeliveryResult {
                    transport,
                    accepted: false,
                    recipient,
                    message_id: None,
                    vendor_status: None,
                    error_code: None,
                    error_message: Some(e.to_string()),
                };
                self.record(event, &failed).await;
                return Err(DispatchError::Vendor(e));
            }
            Err(e) => {
                let code = rejection_code(&e);
                let message = match code.and_then(error_hint) {
                    Some(hint) => format!("{} ({})", e, hint),
                    None => e.to_string(),
                };
                DeliveryResult {
                    transport,
                    accepted: false,
                    recipient,
                    message_id: None,
                    vendor_status: None,
                    error_code: code,
                    error_message: Some(message),
                }
            }
        };
        self.record(event, &result).await;
        Ok(result)
    }

    async fn record(&self, event: &NotificationEvent, result: &DeliveryResult) {
        let entry = DeliveryLogEntry {
            recipient: result.recipient.clone(),
            transport: result.transport,
            message_type: event.template_key.clone(),
            status: if result.accepted { "sent" } else { "failed" }.to_string(),
            message_id: result.message_id.clone(),
            response: Some(
                json!({
                    "vendor_status": result.vendor_status,
                    "error_code": result.error_code,
                })
                .to_string(),
            ),
            error_message: result.error_message.clone(),
            created_at: Utc::now(),
        };
        if let Err(e) = self.log.record(&entry).await {
            tracing::warn!(template = %event.template_key, "delivery log write failed: {}", e);
        }
    }
}

/// Maps named variables onto the template's positional slots (`"1".."n"`).
/// Every declared slot must receive a non-empty value.
pub fn positional_variables(
    template_key: &str,
    template: &WhatsAppTemplate,
    variables: &BTreeMap<String, String>,
) -> Result<BTreeMap<String, String>, DispatchError> {
    let supplied: Vec<&String> = template
        .variables
        .iter()
        .filter_map(|name| variables.get(*name).filter(|v| !v.trim().is_empty()))
        .collect();
    if supplied.len() != template.variables.len() {
        return Err(DispatchError::Validation(format!(
            "template {} expects {} variables, got {}",
            template_key,
            template.variables.len(),
            supplied.len()
        )));
    }
    Ok(supplied
        .into_iter()
        .enumerate()
        .map(|(i, value)| ((i + 1).to_string(), value.clone()))
        .collect())
}

fn missing_variable(name: String) -> DispatchError {
    DispatchError::Validation(format!("missing template variable {}", name))
}
