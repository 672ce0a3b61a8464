use crate::domain::booking::BookingPaymentStatus;
use crate::error::{ErrorKind, FlowError, VendorError};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const PAYMENT_CURRENCY: &str = "USD";
pub const MAX_RECEIPT_BYTES: usize = 5 * 1024 * 1024;
pub const ALLOWED_RECEIPT_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/jpg", "application/pdf"];
pub const MAX_REFERENCE_LEN: usize = 100;

/// One attempt to collect a booking payment through the card gateway.
/// A retry builds a new intent; an intent is never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentIntent {
    pub booking_id: Uuid,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub currency: &'static str,
    pub customer_email: String,
    pub customer_phone: String,
    pub cancellation_url: String,
    pub response_url: String,
}

impl PaymentIntent {
    pub fn new(
        booking_id: Uuid,
        amount: Decimal,
        customer_email: &str,
        customer_phone: &str,
        cancellation_url: String,
        response_url: String,
    ) -> Self {
        Self {
            booking_id,
            amount: amount.round_dp(2),
            currency: PAYMENT_CURRENCY,
            customer_email: customer_email.to_string(),
            customer_phone: customer_phone.to_string(),
            cancellation_url,
            response_url,
        }
    }

    pub fn client_transaction_id(&self) -> String {
        self.booking_id.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VendorPaymentStatus {
    Approved,
    Rejected,
    Pending,
}

impl VendorPaymentStatus {
    /// PayPhone reports `statusCode` 3 for approved and 2 for cancelled, and a
    /// textual `transactionStatus` on the confirm endpoint.
    pub fn from_vendor(status_code: Option<i64>, transaction_status: Option<&str>) -> Self {
        match (status_code, transaction_status) {
            (Some(3), _) | (_, Some("Approved")) => VendorPaymentStatus::Approved,
            (Some(2), _) | (_, Some("Canceled")) | (_, Some("Cancelled")) | (_, Some("Rejected")) => {
                VendorPaymentStatus::Rejected
            }
            _ => VendorPaymentStatus::Pending,
        }
    }
}

/// Synchronous outcome of a vendor payment call, returned to the caller as-is.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PaymentResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<VendorPaymentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_status: Option<BookingPaymentStatus>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub already_processed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_vendor_payload: Option<serde_json::Value>,
}

impl PaymentResult {
    pub fn failed(e: &VendorError) -> Self {
        Self {
            success: false,
            status_code: e.http_status().map(i64::from),
            error: Some(e.to_string()),
            error_kind: Some(e.kind()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePaymentRequest {
    pub booking_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyPaymentRequest {
    pub booking_id: Uuid,
    pub transaction_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransferReferenceRequest {
    pub booking_id: Uuid,
    pub reference: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackParams {
    pub id: Option<String>,
    #[serde(rename = "clientTransactionId")]
    pub client_transaction_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReceiptFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct BankTransferSubmission {
    pub reference_number: String,
    pub transfer_date: Option<NaiveDate>,
    pub receipt: Option<ReceiptFile>,
    pub notes: Option<String>,
}

impl BankTransferSubmission {
    pub fn validate(&self, today: NaiveDate) -> Result<(), FlowError> {
        let reference = self.reference_number.trim();
        if reference.is_empty() {
            return Err(FlowError::Validation("reference number is required".to_string()));
        }
        if reference.chars().count() > MAX_REFERENCE_LEN {
            return Err(FlowError::Validation(format!(
                "reference number exceeds {} characters",
                MAX_REFERENCE_LEN
            )));
        }
        if let Some(date) = self.transfer_date {
            if date > today {
                return Err(FlowError::Validation(
                    "transfer date cannot be in the future".to_string(),
                ));
            }
        }
        if let Some(receipt) = &self.receipt {
            validate_receipt(receipt)?;
        }
        Ok(())
    }
}

pub fn validate_receipt(receipt: &ReceiptFile) -> Result<(), FlowError> {
    if receipt.bytes.len() > MAX_RECEIPT_BYTES {
        return Err(FlowError::Validation("receipt cannot exceed 5MB".to_string()));
    }
    let content_type = receipt.content_type.to_lowercase();
    if !ALLOWED_RECEIPT_TYPES.contains(&content_type.as_str()) {
        return Err(FlowError::Validation(
            "only JPG, PNG or PDF receipts are accepted".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct PaymentProof {
    pub booking_id: Uuid,
    pub reference_number: String,
    pub transfer_date: Option<NaiveDate>,
    pub receipt: Option<ReceiptFile>,
    pub notes: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewRequest {
    pub approve: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewDecision {
    Approve,
    Reject { reason: String },
}

impl From<ReviewRequest> for ReviewDecision {
    fn from(r: ReviewRequest) -> Self {
        if r.approve {
            ReviewDecision::Approve
        } else {
            ReviewDecision::Reject {
                reason: r.reason.unwrap_or_else(|| "proof could not be validated".to_string()),
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferSubmitted {
    pub booking_id: Uuid,
    pub booking_status: BookingPaymentStatus,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()
    }

    fn receipt(content_type: &str, size: usize) -> ReceiptFile {
        ReceiptFile {
            file_name: "proof".to_string(),
            content_type: content_type.to_string(),
            bytes: vec![0u8; size],
        }
    }

    fn submission() -> BankTransferSubmission {
        BankTransferSubmission {
            reference_number: "123456789".to_string(),
            transfer_date: Some(today()),
            receipt: Some(receipt("image/png", 1024)),
            notes: None,
        }
    }

    #[test]
    fn accepts_same_day_transfer() {
        assert!(submission().validate(today()).is_ok());
    }

    #[test]
    fn rejects_future_transfer_date() {
        let mut s = submission();
        s.transfer_date = today().succ_opt();
        assert!(matches!(s.validate(today()), Err(FlowError::Validation(_))));
    }

    #[test]
    fn rejects_oversized_receipt() {
        let mut s = submission();
        s.receipt = Some(receipt("application/pdf", MAX_RECEIPT_BYTES + 1));
        assert!(s.validate(today()).is_err());
    }

    #[test]
    fn accepts_receipt_at_exact_limit() {
        let mut s = submission();
        s.receipt = Some(receipt("image/jpeg", MAX_RECEIPT_BYTES));
        assert!(s.validate(today()).is_ok());
    }

    #[test]
    fn rejects_unsupported_mime_type() {
        let mut s = submission();
        s.receipt = Some(receipt("image/gif", 10));
        assert!(s.validate(today()).is_err());
    }

    #[test]
    fn requires_reference() {
        let mut s = submission();
        s.reference_number = "   ".to_string();
        assert!(s.validate(today()).is_err());
    }

    #[test]
    fn maps_vendor_status_codes() {
        assert_eq!(VendorPaymentStatus::from_vendor(Some(3), None), VendorPaymentStatus::Approved);
        assert_eq!(VendorPaymentStatus::from_vendor(Some(2), None), VendorPaymentStatus::Rejected);
        assert_eq!(
            VendorPaymentStatus::from_vendor(None, Some("Approved")),
            VendorPaymentStatus::Approved
        );
        assert_eq!(VendorPaymentStatus::from_vendor(Some(1), None), VendorPaymentStatus::Pending);
    }

    #[test]
    fn intent_currency_is_fixed() {
        let intent = PaymentIntent::new(
            Uuid::new_v4(),
            Decimal::new(2550, 2),
            "a@b.com",
            "+593999999999",
            "https://x/cancel".to_string(),
            "https://x/callback".to_string(),
        );
        assert_eq!(intent.currency, "USD");
        assert_eq!(intent.client_transaction_id(), intent.booking_id.to_string());
    }
}
