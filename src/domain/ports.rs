use crate::domain::booking::{BankAccount, Booking, BookingPaymentStatus, PaymentMethodCode};
use crate::domain::identity::{Profile, Role, Session};
use crate::domain::notification::{DeliveryLogEntry, DeliveryStatus};
use crate::domain::payment::PaymentProof;
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalOutcome {
    Credited,
    AlreadyCredited,
    /// The booking left the payable statuses without being approved.
    NotPayable(BookingPaymentStatus),
}

/// Booking payment columns and payment records. Bookings themselves are owned
/// by the marketplace application.
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn get_booking(&self, booking_id: Uuid) -> Result<Option<Booking>>;

    async fn list_bank_accounts(&self) -> Result<Vec<BankAccount>>;

    /// Moves `booking_id` from `from` to `to` only if it is still in `from`.
    /// Returns false when another request changed the status first.
    async fn transition(
        &self,
        booking_id: Uuid,
        from: BookingPaymentStatus,
        to: BookingPaymentStatus,
        method: Option<PaymentMethodCode>,
    ) -> Result<bool>;

    async fn record_intent(&self, booking_id: Uuid, vendor_transaction_id: &str, amount: Decimal) -> Result<()>;

    /// Credits an approved vendor transaction exactly once per
    /// `(booking_id, vendor_transaction_id)` and moves the booking to approved.
    async fn record_approval(
        &self,
        booking_id: Uuid,
        vendor_transaction_id: &str,
        amount: Decimal,
        method: PaymentMethodCode,
    ) -> Result<ApprovalOutcome>;

    async fn save_proof(&self, proof: &PaymentProof) -> Result<i64>;
}

#[derive(Debug, Clone)]
pub struct ProfileRecord {
    pub profile: Profile,
    pub has_provider_profile: bool,
}

#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    async fn profile(&self, user_id: Uuid) -> Result<Option<ProfileRecord>>;

    /// True when the user accepted every currently published document required
    /// for `role`. Documents that are not published do not block.
    async fn legal_acceptance_complete(&self, user_id: Uuid, role: Role) -> Result<bool>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, session_id: &str) -> Result<Option<Session>>;

    async fn clear_legal_auto_accepted(&self, session_id: &str) -> Result<()>;
}

#[async_trait]
pub trait DeliveryLog: Send + Sync {
    async fn record(&self, entry: &DeliveryLogEntry) -> Result<()>;

    async fn update_status(
        &self,
        message_id: &str,
        status: DeliveryStatus,
        error_message: Option<&str>,
    ) -> Result<()>;
}
