use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    BookingCreated,
    BookingAccepted,
    PaymentApproved,
    PaymentRejected,
    PaymentProofReceived,
    PaymentPendingReview,
    WithdrawalCompleted,
    ServiceReminder,
    EmailVerification,
    Welcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientRole {
    Admin,
    Provider,
    Customer,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    Email,
    WhatsApp,
    Sms,
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Email => "email",
            Transport::WhatsApp => "whatsapp",
            Transport::Sms => "sms",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Recipient {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub event_type: EventType,
    pub recipient_role: RecipientRole,
    pub template_key: String,
    pub recipient: Recipient,
    pub variables: BTreeMap<String, String>,
}

/// Values a template may reference. Placeholders resolve through
/// [`BookingContext::field`], never through dynamic lookup.
#[derive(Debug, Clone, Default)]
pub struct BookingContext {
    pub booking_id: String,
    pub customer_name: String,
    pub provider_name: String,
    pub service_name: String,
    pub scheduled_at: String,
    pub booking_url: String,
    pub amount: String,
    pub reason: String,
}

pub const BOOKING_FIELDS: [&str; 8] = [
    "booking_id",
    "customer_name",
    "provider_name",
    "service_name",
    "scheduled_at",
    "booking_url",
    "amount",
    "reason",
];

impl BookingContext {
    pub fn field(&self, name: &str) -> Option<&str> {
        let value = match name {
            "booking_id" => &self.booking_id,
            "customer_name" => &self.customer_name,
            "provider_name" => &self.provider_name,
            "service_name" => &self.service_name,
            "scheduled_at" => &self.scheduled_at,
            "booking_url" => &self.booking_url,
            "amount" => &self.amount,
            "reason" => &self.reason,
            _ => return None,
        };
        Some(value.as_str())
    }

    /// Builds the variable map for the given placeholder names. Unknown names
    /// are left out so template validation can report them.
    pub fn variables_for(&self, names: &[&str]) -> BTreeMap<String, String> {
        names
            .iter()
            .filter_map(|name| self.field(name).map(|v| (name.to_string(), v.to_string())))
            .collect()
    }
}

impl NotificationEvent {
    pub fn for_booking(
        event_type: EventType,
        recipient_role: RecipientRole,
        template_key: &str,
        recipient: Recipient,
        ctx: &BookingContext,
    ) -> Self {
        Self {
            event_type,
            recipient_role,
            template_key: template_key.to_string(),
            recipient,
            variables: ctx.variables_for(&BOOKING_FIELDS),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeliveryResult {
    pub transport: Transport,
    pub accepted: bool,
    pub recipient: String,
    pub message_id: Option<String>,
    pub vendor_status: Option<String>,
    pub error_code: Option<i64>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Queued,
    Sent,
    Delivered,
    Read,
    Failed,
    Undelivered,
    Unknown,
}

impl DeliveryStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "queued" | "accepted" | "scheduled" | "sending" => DeliveryStatus::Queued,
            "sent" => DeliveryStatus::Sent,
            "delivered" => DeliveryStatus::Delivered,
            "read" => DeliveryStatus::Read,
            "failed" => DeliveryStatus::Failed,
            "undelivered" => DeliveryStatus::Undelivered,
            _ => DeliveryStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Queued => "queued",
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Read => "read",
            DeliveryStatus::Failed => "failed",
            DeliveryStatus::Undelivered => "undelivered",
            DeliveryStatus::Unknown => "unknown",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, DeliveryStatus::Failed | DeliveryStatus::Undelivered)
    }
}

/// Out-of-band view of a sent message.
#[derive(Debug, Clone, Serialize)]
pub struct MessageStatusReport {
    pub sid: String,
    pub status: DeliveryStatus,
    pub raw_status: String,
    pub to: Option<String>,
    pub from: Option<String>,
    pub error_code: Option<i64>,
    pub error_message: Option<String>,
    pub error_hint: Option<&'static str>,
    pub price: Option<String>,
    pub price_unit: Option<String>,
    pub date_sent: Option<String>,
    pub date_updated: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeliveryLogEntry {
    pub recipient: String,
    pub transport: Transport,
    pub message_type: String,
    pub status: String,
    pub message_id: Option<String>,
    pub response: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}
