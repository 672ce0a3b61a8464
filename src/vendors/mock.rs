use crate::domain::notification::{DeliveryStatus, MessageStatusReport};
use crate::domain::payment::{PaymentIntent, VendorPaymentStatus};
use crate::error::VendorError;
use crate::vendors::{MailVendor, MessagingVendor, PaymentVendor, SentMessage, VendorCheckout, VendorConfirmation};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Local stand-in for the card gateway. `behavior` is one of
/// `ALWAYS_SUCCESS` (default), `ALWAYS_FAILURE`, `ALWAYS_TIMEOUT`,
/// `ALWAYS_PENDING`, `ALWAYS_REJECTED`.
pub struct MockPaymentVendor {
    pub behavior: String,
    pub calls: AtomicUsize,
}

impl MockPaymentVendor {
    pub fn new(behavior: &str) -> Self {
        Self {
            behavior: behavior.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn failure(&self) -> Option<VendorError> {
        match self.behavior.as_str() {
            "ALWAYS_FAILURE" => Some(VendorError::Rejection {
                status: 400,
                body: "mock decline".to_string(),
            }),
            "ALWAYS_TIMEOUT" => Some(VendorError::Network {
                timed_out: true,
                message: "mock timeout".to_string(),
            }),
            _ => None,
        }
    }
}

#[async_trait::async_trait]
impl PaymentVendor for MockPaymentVendor {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn create_payment(&self, intent: &PaymentIntent) -> Result<VendorCheckout, VendorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.failure() {
            return Err(e);
        }
        let transaction_id = format!("mock_txn_{}", uuid::Uuid::new_v4().simple());
        Ok(VendorCheckout {
            payment_url: Some(format!("https://mock.pay/checkout/{}", intent.booking_id)),
            transaction_id: Some(transaction_id.clone()),
            raw: json!({ "transactionId": transaction_id }),
        })
    }

    async fn confirm_payment(
        &self,
        transaction_id: &str,
        client_transaction_id: &str,
    ) -> Result<VendorConfirmation, VendorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.failure() {
            return Err(e);
        }
        let (status_code, status) = match self.behavior.as_str() {
            "ALWAYS_PENDING" => (1, "Pending"),
            "ALWAYS_REJECTED" => (2, "Canceled"),
            _ => (3, "Approved"),
        };
        Ok(VendorConfirmation {
            status: VendorPaymentStatus::from_vendor(Some(status_code), Some(status)),
            status_code: Some(status_code),
            transaction_status: Some(status.to_string()),
            raw: json!({
                "transactionId": transaction_id,
                "clientTransactionId": client_transaction_id,
                "statusCode": status_code,
                "transactionStatus": status,
            }),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedMessage {
    Template {
        to: String,
        content_sid: String,
        variables: BTreeMap<String, String>,
    },
    Sms {
        to: String,
        body: String,
    },
}

/// Messaging vendor that keeps every request in memory. A configured
/// `reject_code` makes every send fail the way Twilio does.
#[derive(Default)]
pub struct RecordingMessaging {
    pub sent: Mutex<Vec<RecordedMessage>>,
    pub reject_code: Option<i64>,
}

impl RecordingMessaging {
    pub fn rejecting(code: i64) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            reject_code: Some(code),
        }
    }

    pub fn sent(&self) -> Vec<RecordedMessage> {
        self.sent.lock().map(|v| v.clone()).unwrap_or_default()
    }

    fn push(&self, msg: RecordedMessage) -> Result<SentMessage, VendorError> {
        if let Some(code) = self.reject_code {
            return Err(VendorError::Rejection {
                status: 400,
                body: json!({ "code": code, "message": "rejected by mock" }).to_string(),
            });
        }
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| VendorError::Decode("mock state poisoned".to_string()))?;
        sent.push(msg);
        Ok(SentMessage {
            sid: format!("SM{:032}", sent.len()),
            status: "queued".to_string(),
        })
    }
}

#[async_trait::async_trait]
impl MessagingVendor for RecordingMessaging {
    async fn send_template(
        &self,
        to: &str,
        content_sid: &str,
        variables: &BTreeMap<String, String>,
    ) -> Result<SentMessage, VendorError> {
        self.push(RecordedMessage::Template {
            to: to.to_string(),
            content_sid: content_sid.to_string(),
            variables: variables.clone(),
        })
    }

    async fn send_sms(&self, to: &str, body: &str) -> Result<SentMessage, VendorError> {
        self.push(RecordedMessage::Sms {
            to: to.to_string(),
            body: body.to_string(),
        })
    }

    async fn message_status(&self, sid: &str) -> Result<MessageStatusReport, VendorError> {
        Ok(MessageStatusReport {
            sid: sid.to_string(),
            status: DeliveryStatus::Delivered,
            raw_status: "delivered".to_string(),
            to: None,
            from: None,
            error_code: None,
            error_message: None,
            error_hint: None,
            price: None,
            price_unit: None,
            date_sent: None,
            date_updated: None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEmail {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<RecordedEmail>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<RecordedEmail> {
        self.sent.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl MailVendor for RecordingMailer {
    async fn send_email(&self, to: &[String], subject: &str, body: &str) -> Result<Option<String>, VendorError> {
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| VendorError::Decode("mock state poisoned".to_string()))?;
        sent.push(RecordedEmail {
            to: to.to_vec(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(Some(format!("mail-{}", sent.len())))
    }
}
