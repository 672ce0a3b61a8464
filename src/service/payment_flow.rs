use crate::config::CallbackUrls;
use crate::domain::booking::{BankAccount, Booking, BookingPaymentStatus, Party, PaymentMethodCode};
use crate::domain::notification::{BookingContext, EventType, NotificationEvent, Recipient, RecipientRole};
use crate::domain::payment::{
    BankTransferSubmission, CallbackParams, PaymentIntent, PaymentProof, PaymentResult, ReviewDecision,
    TransferSubmitted, VendorPaymentStatus,
};
use crate::domain::phone::to_e164;
use crate::domain::ports::{ApprovalOutcome, BookingStore};
use crate::error::{FlowError, VendorError};
use crate::service::notification_dispatch::NotificationDispatch;
use crate::vendors::PaymentVendor;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

const TRANSFER_RECEIVED_MESSAGE: &str =
    "Transfer received. Our team validates transfers within 1-4 business hours.";

#[derive(Debug, Clone, Serialize)]
pub struct BankTransferPage {
    pub booking_id: Uuid,
    pub service_name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub payment_status: BookingPaymentStatus,
    pub bank_accounts: Vec<BankAccount>,
}

#[derive(Debug, Clone)]
pub struct CallbackOutcome {
    pub booking_id: Uuid,
    pub result: PaymentResult,
    pub redirect_url: String,
}

/// Booking payment state machine. Card payments go through the payment vendor,
/// bank transfers through an uploaded proof and an administrator review.
#[derive(Clone)]
pub struct PaymentFlow {
    pub store: Arc<dyn BookingStore>,
    pub vendor: Arc<dyn PaymentVendor>,
    pub notifications: NotificationDispatch,
    pub urls: CallbackUrls,
}

impl PaymentFlow {
    pub fn new(
        store: Arc<dyn BookingStore>,
        vendor: Arc<dyn PaymentVendor>,
        notifications: NotificationDispatch,
        urls: CallbackUrls,
    ) -> Self {
        Self {
            store,
            vendor,
            notifications,
            urls,
        }
    }

    pub async fn create_payment(&self, booking_id: Uuid, actor: Uuid) -> Result<PaymentResult, FlowError> {
        let booking = self.load_owned(booking_id, actor).await?;
        ensure_can_move(&booking, BookingPaymentStatus::AwaitingConfirmation)?;

        let intent = PaymentIntent::new(
            booking.id,
            booking.total_cost,
            booking.customer.email.as_deref().unwrap_or_default(),
            &booking.customer.phone.as_deref().map(to_e164).unwrap_or_default(),
            self.urls.payment_cancellation_url(booking.id),
            self.urls.payment_response_url(),
        );

        let checkout = match self.vendor.create_payment(&intent).await {
            Ok(c) => c,
            Err(e) => return Ok(self.vendor_failure(booking.id, "create", &e)),
        };
        let (Some(payment_url), Some(transaction_id)) = (checkout.payment_url, checkout.transaction_id) else {
            let e = VendorError::Decode("checkout response without paymentUrl or transactionId".to_string());
            return Ok(self.vendor_failure(booking.id, "create", &e));
        };

        self.store
            .record_intent(booking.id, &transaction_id, intent.amount)
            .await?;
        self.move_status(
            &booking,
            BookingPaymentStatus::AwaitingConfirmation,
            PaymentMethodCode::Payphone,
        )
        .await?;

        tracing::info!(
            booking_id = %booking.id,
            vendor = self.vendor.name(),
            transaction_id = %transaction_id,
            "payment intent created"
        );

        Ok(PaymentResult {
            success: true,
            payment_url: Some(payment_url),
            transaction_id: Some(transaction_id),
            booking_status: Some(BookingPaymentStatus::AwaitingConfirmation),
            raw_vendor_payload: Some(checkout.raw),
            ..Default::default()
        })
    }

    /// Confirms a card transaction with the vendor. `actor` is the customer for
    /// API calls and `None` for the gateway callback.
    pub async fn verify_payment(
        &self,
        transaction_id: &str,
        booking_id: Uuid,
        actor: Option<Uuid>,
    ) -> Result<PaymentResult, FlowError> {
        let transaction_id = transaction_id.trim();
        if transaction_id.is_empty() {
            return Err(FlowError::Validation("transaction id is required".to_string()));
        }
        let booking = match actor {
            Some(user_id) => self.load_owned(booking_id, user_id).await?,
            None => self.load(booking_id).await?,
        };

        // A submitted transfer proof does not block a card confirmation.
        match booking.payment_status {
            BookingPaymentStatus::Approved => return Ok(already_processed(transaction_id)),
            BookingPaymentStatus::AwaitingConfirmation | BookingPaymentStatus::ProofSubmitted => {}
            other => {
                return Err(FlowError::InvalidTransition {
                    from: other.to_string(),
                    to: BookingPaymentStatus::Approved.to_string(),
                })
            }
        }

        let confirmation = match self
            .vendor
            .confirm_payment(transaction_id, &booking.id.to_string())
            .await
        {
            Ok(c) => c,
            Err(e) => return Ok(self.vendor_failure(booking.id, "confirm", &e)),
        };

        let mut result = PaymentResult {
            transaction_id: Some(transaction_id.to_string()),
            status_code: confirmation.status_code,
            status: Some(confirmation.status),
            raw_vendor_payload: Some(confirmation.raw),
            ..Default::default()
        };

        match confirmation.status {
            VendorPaymentStatus::Approved => {
                let outcome = self
                    .store
                    .record_approval(booking.id, transaction_id, booking.total_cost, PaymentMethodCode::Payphone)
                    .await?;
                result.success = true;
                result.booking_status = Some(BookingPaymentStatus::Approved);
                match outcome {
                    ApprovalOutcome::Credited => {
                        tracing::info!(booking_id = %booking.id, transaction_id, "card payment approved");
                        self.notify_approved(&booking).await;
                    }
                    ApprovalOutcome::AlreadyCredited => {
                        tracing::info!(booking_id = %booking.id, transaction_id, "card payment already credited");
                        result.already_processed = true;
                    }
                    ApprovalOutcome::NotPayable(status) => {
                        tracing::warn!(
                            booking_id = %booking.id,
                            transaction_id,
                            status = %status,
                            "vendor approved a payment for a booking that can no longer be paid"
                        );
                        return Err(FlowError::InvalidTransition {
                            from: status.to_string(),
                            to: BookingPaymentStatus::Approved.to_string(),
                        });
                    }
                }
            }
            VendorPaymentStatus::Rejected => {
                let reason = confirmation
                    .transaction_status
                    .unwrap_or_else(|| "payment was not approved".to_string());
                result.error = Some(format!("payment rejected by vendor: {}", reason));
                if booking.payment_status != BookingPaymentStatus::AwaitingConfirmation {
                    // The pending transfer proof still waits for review.
                    result.booking_status = Some(booking.payment_status);
                    return Ok(result);
                }
                let moved = self
                    .store
                    .transition(
                        booking.id,
                        BookingPaymentStatus::AwaitingConfirmation,
                        BookingPaymentStatus::Rejected,
                        Some(PaymentMethodCode::Payphone),
                    )
                    .await?;
                result.booking_status = Some(BookingPaymentStatus::Rejected);
                if moved {
                    tracing::info!(booking_id = %booking.id, transaction_id, "card payment rejected");
                    self.notify_customer(&booking, EventType::PaymentRejected, "payment_rejected", &reason)
                        .await;
                }
            }
            VendorPaymentStatus::Pending => {
                result.booking_status = Some(booking.payment_status);
                result.error = Some("payment is still pending".to_string());
            }
        }

        Ok(result)
    }

    /// `clientTransactionId` carries the booking id. Once it parses, the browser
    /// is always sent back to the booking, with `payment=failed` on any error.
    pub async fn handle_callback(&self, params: CallbackParams) -> Result<CallbackOutcome, FlowError> {
        let id = params
            .id
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| FlowError::Validation("missing transaction id".to_string()))?;
        let client_tx = params
            .client_transaction_id
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| FlowError::Validation("missing client transaction id".to_string()))?;
        let booking_id = Uuid::parse_str(client_tx.trim())
            .map_err(|_| FlowError::Validation("client transaction id is not a booking id".to_string()))?;

        let result = match self.verify_payment(&id, booking_id, None).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(booking_id = %booking_id, transaction_id = %id, "payment callback not confirmed: {}", e);
                PaymentResult {
                    transaction_id: Some(id.trim().to_string()),
                    error: Some(e.to_string()),
                    ..Default::default()
                }
            }
        };
        let outcome = if result.success { "approved" } else { "failed" };
        let redirect_url = format!("{}?payment={}", self.urls.booking_url(booking_id), outcome);
        Ok(CallbackOutcome {
            booking_id,
            result,
            redirect_url,
        })
    }

    pub async fn bank_transfer_page(&self, booking_id: Uuid, actor: Uuid) -> Result<BankTransferPage, FlowError> {
        let booking = self.load_owned(booking_id, actor).await?;
        if booking.payment_status == BookingPaymentStatus::Approved {
            return Err(FlowError::AlreadyPaid);
        }
        let bank_accounts = self.store.list_bank_accounts().await?;
        Ok(BankTransferPage {
            booking_id: booking.id,
            service_name: booking.service_name,
            amount: booking.total_cost,
            payment_status: booking.payment_status,
            bank_accounts,
        })
    }

    pub async fn confirm_bank_transfer(
        &self,
        booking_id: Uuid,
        actor: Uuid,
        submission: BankTransferSubmission,
        today: NaiveDate,
    ) -> Result<TransferSubmitted, FlowError> {
        submission.validate(today)?;
        let booking = self.load_owned(booking_id, actor).await?;
        ensure_can_move(&booking, BookingPaymentStatus::ProofSubmitted)?;

        let proof = PaymentProof {
            booking_id: booking.id,
            reference_number: submission.reference_number.trim().to_string(),
            transfer_date: submission.transfer_date,
            receipt: submission.receipt,
            notes: submission.notes.filter(|n| !n.trim().is_empty()),
            submitted_at: Utc::now(),
        };
        let proof_id = self.store.save_proof(&proof).await?;
        self.move_status(&booking, BookingPaymentStatus::ProofSubmitted, PaymentMethodCode::BankTransfer)
            .await?;
        tracing::info!(booking_id = %booking.id, proof_id, "bank transfer proof submitted");

        let ctx = self.context(&booking, "");
        self.notifications
            .notify(NotificationEvent::for_booking(
                EventType::PaymentProofReceived,
                RecipientRole::Customer,
                "payment_proof_received",
                email_only(&booking.customer),
                &ctx,
            ))
            .await;
        self.notifications
            .notify(NotificationEvent::for_booking(
                EventType::PaymentPendingReview,
                RecipientRole::Admin,
                "payment_pending_review",
                Recipient::default(),
                &ctx,
            ))
            .await;

        Ok(TransferSubmitted {
            booking_id: booking.id,
            booking_status: BookingPaymentStatus::ProofSubmitted,
            message: TRANSFER_RECEIVED_MESSAGE.to_string(),
        })
    }

    pub async fn register_transfer_reference(
        &self,
        booking_id: Uuid,
        actor: Uuid,
        reference: &str,
    ) -> Result<TransferSubmitted, FlowError> {
        let submission = BankTransferSubmission {
            reference_number: reference.to_string(),
            transfer_date: None,
            receipt: None,
            notes: None,
        };
        self.confirm_bank_transfer(booking_id, actor, submission, Utc::now().date_naive())
            .await
    }

    pub async fn review_bank_transfer(
        &self,
        booking_id: Uuid,
        decision: ReviewDecision,
    ) -> Result<BookingPaymentStatus, FlowError> {
        let booking = self.load(booking_id).await?;
        match booking.payment_status {
            BookingPaymentStatus::ProofSubmitted => {}
            BookingPaymentStatus::Approved => return Err(FlowError::AlreadyPaid),
            other => {
                return Err(FlowError::InvalidTransition {
                    from: other.to_string(),
                    to: "reviewed".to_string(),
                })
            }
        }

        match decision {
            ReviewDecision::Approve => {
                let outcome = self
                    .store
                    .record_approval(
                        booking.id,
                        &transfer_transaction_id(booking.id),
                        booking.total_cost,
                        PaymentMethodCode::BankTransfer,
                    )
                    .await?;
                match outcome {
                    ApprovalOutcome::Credited => {}
                    ApprovalOutcome::AlreadyCredited => return Err(FlowError::AlreadyPaid),
                    ApprovalOutcome::NotPayable(status) => {
                        return Err(FlowError::InvalidTransition {
                            from: status.to_string(),
                            to: BookingPaymentStatus::Approved.to_string(),
                        })
                    }
                }
                tracing::info!(booking_id = %booking.id, "bank transfer approved");
                self.notify_approved(&booking).await;
                Ok(BookingPaymentStatus::Approved)
            }
            ReviewDecision::Reject { reason } => {
                self.move_status(&booking, BookingPaymentStatus::Rejected, PaymentMethodCode::BankTransfer)
                    .await?;
                tracing::info!(booking_id = %booking.id, reason = %reason, "bank transfer rejected");
                self.notify_customer(&booking, EventType::PaymentRejected, "payment_rejected", &reason)
                    .await;
                Ok(BookingPaymentStatus::Rejected)
            }
        }
    }

    async fn load(&self, booking_id: Uuid) -> Result<Booking, FlowError> {
        self.store
            .get_booking(booking_id)
            .await?
            .ok_or(FlowError::NotFound(booking_id))
    }

    async fn load_owned(&self, booking_id: Uuid, actor: Uuid) -> Result<Booking, FlowError> {
        let booking = self.load(booking_id).await?;
        if booking.customer.user_id != actor {
            return Err(FlowError::Forbidden);
        }
        Ok(booking)
    }

    async fn move_status(
        &self,
        booking: &Booking,
        to: BookingPaymentStatus,
        method: PaymentMethodCode,
    ) -> Result<(), FlowError> {
        let moved = self
            .store
            .transition(booking.id, booking.payment_status, to, Some(method))
            .await?;
        if !moved {
            // Another request changed the status after we read it.
            return Err(FlowError::InvalidTransition {
                from: booking.payment_status.to_string(),
                to: to.to_string(),
            });
        }
        Ok(())
    }

    fn vendor_failure(&self, booking_id: Uuid, operation: &str, e: &VendorError) -> PaymentResult {
        tracing::warn!(
            booking_id = %booking_id,
            vendor = self.vendor.name(),
            operation,
            kind = ?e.kind(),
            "payment vendor call failed: {}",
            e
        );
        PaymentResult::failed(e)
    }

    fn context(&self, booking: &Booking, reason: &str) -> BookingContext {
        BookingContext {
            booking_id: booking.id.to_string(),
            customer_name: booking.customer.name.clone(),
            provider_name: booking.provider.name.clone(),
            service_name: booking.service_name.clone(),
            scheduled_at: booking.scheduled_at.format("%Y-%m-%d %H:%M").to_string(),
            booking_url: self.urls.booking_url(booking.id),
            amount: format!("{:.2}", booking.total_cost),
            reason: reason.to_string(),
        }
    }

    async fn notify_approved(&self, booking: &Booking) {
        let ctx = self.context(booking, "");
        for (role, party) in [
            (RecipientRole::Customer, &booking.customer),
            (RecipientRole::Provider, &booking.provider),
        ] {
            self.notifications
                .notify(NotificationEvent::for_booking(
                    EventType::PaymentApproved,
                    role,
                    "payment_approved",
                    recipient(party),
                    &ctx,
                ))
                .await;
        }
    }

    async fn notify_customer(&self, booking: &Booking, event_type: EventType, template_key: &str, reason: &str) {
        let ctx = self.context(booking, reason);
        self.notifications
            .notify(NotificationEvent::for_booking(
                event_type,
                RecipientRole::Customer,
                template_key,
                recipient(&booking.customer),
                &ctx,
            ))
            .await;
    }
}

fn ensure_can_move(booking: &Booking, to: BookingPaymentStatus) -> Result<(), FlowError> {
    if booking.payment_status == BookingPaymentStatus::Approved {
        return Err(FlowError::AlreadyPaid);
    }
    if !booking.payment_status.can_transition_to(to) {
        return Err(FlowError::InvalidTransition {
            from: booking.payment_status.to_string(),
            to: to.to_string(),
        });
    }
    Ok(())
}

fn already_processed(transaction_id: &str) -> PaymentResult {
    PaymentResult {
        success: true,
        transaction_id: Some(transaction_id.to_string()),
        status: Some(VendorPaymentStatus::Approved),
        booking_status: Some(BookingPaymentStatus::Approved),
        already_processed: true,
        ..Default::default()
    }
}

pub fn transfer_transaction_id(booking_id: Uuid) -> String {
    format!("transfer-{}", booking_id)
}

fn recipient(party: &Party) -> Recipient {
    Recipient {
        name: Some(party.name.clone()),
        email: party.email.clone(),
        phone: party.phone.clone(),
    }
}

fn email_only(party: &Party) -> Recipient {
    Recipient {
        phone: None,
        ..recipient(party)
    }
}
