use crate::domain::booking::{BankAccount, Booking, BookingPaymentStatus, PaymentMethodCode};
use crate::domain::identity::{Role, Session};
use crate::domain::notification::{DeliveryLogEntry, DeliveryStatus};
use crate::domain::payment::PaymentProof;
use crate::domain::ports::{
    ApprovalOutcome, BookingStore, DeliveryLog, IdentityDirectory, ProfileRecord, SessionStore,
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRecord {
    pub booking_id: Uuid,
    pub vendor_transaction_id: String,
    pub amount: Decimal,
    pub approved: bool,
}

/// Booking store kept in process memory. Used by tests and local runs without
/// a database.
#[derive(Default, Clone)]
pub struct InMemoryBookingStore {
    bookings: Arc<RwLock<HashMap<Uuid, Booking>>>,
    bank_accounts: Arc<RwLock<Vec<BankAccount>>>,
    payments: Arc<RwLock<HashMap<(Uuid, String), PaymentRecord>>>,
    proofs: Arc<RwLock<Vec<PaymentProof>>>,
}

impl InMemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_booking(&self, booking: Booking) {
        self.bookings.write().await.insert(booking.id, booking);
    }

    pub async fn insert_bank_account(&self, account: BankAccount) {
        self.bank_accounts.write().await.push(account);
    }

    pub async fn payments(&self) -> Vec<PaymentRecord> {
        self.payments.read().await.values().cloned().collect()
    }

    pub async fn approved_payments(&self, booking_id: Uuid) -> usize {
        self.payments
            .read()
            .await
            .values()
            .filter(|p| p.booking_id == booking_id && p.approved)
            .count()
    }

    pub async fn proofs(&self) -> Vec<PaymentProof> {
        self.proofs.read().await.clone()
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn get_booking(&self, booking_id: Uuid) -> Result<Option<Booking>> {
        Ok(self.bookings.read().await.get(&booking_id).cloned())
    }

    async fn list_bank_accounts(&self) -> Result<Vec<BankAccount>> {
        Ok(self.bank_accounts.read().await.clone())
    }

    async fn transition(
        &self,
        booking_id: Uuid,
        from: BookingPaymentStatus,
        to: BookingPaymentStatus,
        method: Option<PaymentMethodCode>,
    ) -> Result<bool> {
        if !from.can_transition_to(to) {
            return Err(anyhow!("illegal payment status transition {} -> {}", from, to));
        }
        let mut bookings = self.bookings.write().await;
        match bookings.get_mut(&booking_id) {
            Some(b) if b.payment_status == from => {
                b.payment_status = to;
                if method.is_some() {
                    b.payment_method = method;
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_intent(&self, booking_id: Uuid, vendor_transaction_id: &str, amount: Decimal) -> Result<()> {
        self.payments
            .write()
            .await
            .entry((booking_id, vendor_transaction_id.to_string()))
            .or_insert_with(|| PaymentRecord {
                booking_id,
                vendor_transaction_id: vendor_transaction_id.to_string(),
                amount,
                approved: false,
            });
        Ok(())
    }

    async fn record_approval(
        &self,
        booking_id: Uuid,
        vendor_transaction_id: &str,
        amount: Decimal,
        method: PaymentMethodCode,
    ) -> Result<ApprovalOutcome> {
        // Both locks held for the whole check-and-set.
        let mut bookings = self.bookings.write().await;
        let mut payments = self.payments.write().await;

        let Some(booking) = bookings.get_mut(&booking_id) else {
            return Err(anyhow!("booking {} not found", booking_id));
        };
        match booking.payment_status {
            BookingPaymentStatus::AwaitingConfirmation | BookingPaymentStatus::ProofSubmitted => {}
            BookingPaymentStatus::Approved => return Ok(ApprovalOutcome::AlreadyCredited),
            other => return Ok(ApprovalOutcome::NotPayable(other)),
        }
        let key = (booking_id, vendor_transaction_id.to_string());
        if payments.get(&key).map(|p| p.approved).unwrap_or(false) {
            return Ok(ApprovalOutcome::AlreadyCredited);
        }

        booking.payment_status = BookingPaymentStatus::Approved;
        booking.payment_method = Some(method);
        payments.insert(
            key,
            PaymentRecord {
                booking_id,
                vendor_transaction_id: vendor_transaction_id.to_string(),
                amount,
                approved: true,
            },
        );
        Ok(ApprovalOutcome::Credited)
    }

    async fn save_proof(&self, proof: &PaymentProof) -> Result<i64> {
        let mut proofs = self.proofs.write().await;
        proofs.push(proof.clone());
        Ok(proofs.len() as i64)
    }
}

#[derive(Default, Clone)]
pub struct InMemoryIdentityDirectory {
    profiles: Arc<RwLock<HashMap<Uuid, ProfileRecord>>>,
    accepted_legal: Arc<RwLock<HashSet<Uuid>>>,
}

impl InMemoryIdentityDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_profile(&self, user_id: Uuid, record: ProfileRecord) {
        self.profiles.write().await.insert(user_id, record);
    }

    pub async fn accept_legal(&self, user_id: Uuid) {
        self.accepted_legal.write().await.insert(user_id);
    }
}

#[async_trait]
impl IdentityDirectory for InMemoryIdentityDirectory {
    async fn profile(&self, user_id: Uuid) -> Result<Option<ProfileRecord>> {
        Ok(self.profiles.read().await.get(&user_id).cloned())
    }

    async fn legal_acceptance_complete(&self, user_id: Uuid, _role: Role) -> Result<bool> {
        Ok(self.accepted_legal.read().await.contains(&user_id))
    }
}

#[derive(Default, Clone)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session_id: &str, session: Session) {
        self.sessions.write().await.insert(session_id.to_string(), session);
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }

    async fn clear_legal_auto_accepted(&self, session_id: &str) -> Result<()> {
        if let Some(s) = self.sessions.write().await.get_mut(session_id) {
            s.legal_auto_accepted = false;
        }
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryDeliveryLog {
    entries: Arc<RwLock<Vec<DeliveryLogEntry>>>,
}

impl InMemoryDeliveryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<DeliveryLogEntry> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl DeliveryLog for InMemoryDeliveryLog {
    async fn record(&self, entry: &DeliveryLogEntry) -> Result<()> {
        self.entries.write().await.push(entry.clone());
        Ok(())
    }

    async fn update_status(
        &self,
        message_id: &str,
        status: DeliveryStatus,
        error_message: Option<&str>,
    ) -> Result<()> {
        let mut entries = self.entries.write().await;
        for e in entries
            .iter_mut()
            .filter(|e| e.message_id.as_deref() == Some(message_id))
        {
            e.status = status.as_str().to_string();
            if let Some(msg) = error_message {
                e.error_message = Some(msg.to_string());
            }
        }
        Ok(())
    }
}
