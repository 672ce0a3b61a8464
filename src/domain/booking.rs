use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payment status of a booking.
///
/// Card payments go `Pending -> AwaitingConfirmation -> Approved | Rejected`,
/// bank transfers go `Pending -> ProofSubmitted -> Approved | Rejected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingPaymentStatus {
    Pending,
    AwaitingConfirmation,
    ProofSubmitted,
    Approved,
    Rejected,
}

impl BookingPaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingPaymentStatus::Pending => "pending",
            BookingPaymentStatus::AwaitingConfirmation => "awaiting_confirmation",
            BookingPaymentStatus::ProofSubmitted => "proof_submitted",
            BookingPaymentStatus::Approved => "approved",
            BookingPaymentStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BookingPaymentStatus::Pending),
            "awaiting_confirmation" => Some(BookingPaymentStatus::AwaitingConfirmation),
            "proof_submitted" => Some(BookingPaymentStatus::ProofSubmitted),
            "approved" => Some(BookingPaymentStatus::Approved),
            "rejected" => Some(BookingPaymentStatus::Rejected),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, next: BookingPaymentStatus) -> bool {
        use BookingPaymentStatus::*;
        matches!(
            (self, next),
            (Pending, AwaitingConfirmation)
                | (AwaitingConfirmation, AwaitingConfirmation)
                | (Rejected, AwaitingConfirmation)
                | (AwaitingConfirmation, Approved)
                | (AwaitingConfirmation, Rejected)
                | (Pending, ProofSubmitted)
                | (AwaitingConfirmation, ProofSubmitted)
                | (Rejected, ProofSubmitted)
                | (ProofSubmitted, Approved)
                | (ProofSubmitted, Rejected)
        )
    }
}

impl std::fmt::Display for BookingPaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethodCode {
    Payphone,
    BankTransfer,
}

impl PaymentMethodCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethodCode::Payphone => "payphone",
            PaymentMethodCode::BankTransfer => "bank_transfer",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Party {
    pub user_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub customer: Party,
    pub provider: Party,
    pub service_name: String,
    pub scheduled_at: DateTime<Utc>,
    pub total_cost: Decimal,
    pub payment_status: BookingPaymentStatus,
    pub payment_method: Option<PaymentMethodCode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BankAccount {
    pub id: i64,
    pub bank_name: String,
    pub account_type: String,
    pub account_number: String,
    pub holder_name: String,
}
