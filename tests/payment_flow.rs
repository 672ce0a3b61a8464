mod common;

use booking_payments::config::PayPhoneConfig;
use booking_payments::domain::booking::{BookingPaymentStatus, PaymentMethodCode};
use booking_payments::domain::payment::{
    BankTransferSubmission, CallbackParams, ReceiptFile, ReviewDecision, VendorPaymentStatus, MAX_RECEIPT_BYTES,
};
use booking_payments::error::{ErrorKind, FlowError};
use booking_payments::vendors::mock::MockPaymentVendor;
use booking_payments::vendors::payphone::PayPhoneGateway;
use booking_payments::vendors::VendorClient;
use chrono::NaiveDate;
use common::{harness, ADMIN_EMAIL};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn payphone(server: &MockServer, timeout_ms: u64) -> Arc<PayPhoneGateway> {
    Arc::new(PayPhoneGateway::new(
        &PayPhoneConfig {
            token: "test-token".to_string(),
            store_id: "store-1".to_string(),
            api_url: format!("{}/api/button/Prepare", server.uri()),
            confirm_url: format!("{}/api/button/V2/Confirm", server.uri()),
        },
        VendorClient::new(timeout_ms),
    ))
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 5, 1).unwrap()
}

fn transfer(reference: &str) -> BankTransferSubmission {
    BankTransferSubmission {
        reference_number: reference.to_string(),
        transfer_date: Some(today()),
        receipt: Some(ReceiptFile {
            file_name: "receipt.png".to_string(),
            content_type: "image/png".to_string(),
            bytes: vec![1u8; 2048],
        }),
        notes: Some("paid from savings".to_string()),
    }
}

#[tokio::test]
async fn create_returns_checkout_link_and_waits_for_confirmation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/button/Prepare"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_partial_json(json!({"currency": "USD", "amount": 25.5, "storeId": "store-1"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"paymentUrl": "https://pay.example/checkout/abc", "transactionId": "T1"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(payphone(&server, 2_000));
    let b = h.with_booking(BookingPaymentStatus::Pending).await;

    let result = h.flow.create_payment(b.id, b.customer.user_id).await.unwrap();
    assert!(result.success);
    assert_eq!(result.transaction_id.as_deref(), Some("T1"));
    assert_eq!(result.payment_url.as_deref(), Some("https://pay.example/checkout/abc"));
    assert_eq!(h.status_of(b.id).await, BookingPaymentStatus::AwaitingConfirmation);
    assert_eq!(h.store.approved_payments(b.id).await, 0);
}

#[tokio::test]
async fn create_timeout_leaves_booking_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/button/Prepare"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"paymentUrl": "https://late", "transactionId": "T9"}))
                .set_delay(Duration::from_millis(1_500)),
        )
        .mount(&server)
        .await;

    let h = harness(payphone(&server, 200));
    let b = h.with_booking(BookingPaymentStatus::Pending).await;

    let result = h.flow.create_payment(b.id, b.customer.user_id).await.unwrap();
    assert!(!result.success);
    assert_eq!(result.error_kind, Some(ErrorKind::NetworkError));
    assert!(result.error.unwrap().contains("timeout"));
    assert_eq!(h.status_of(b.id).await, BookingPaymentStatus::Pending);
}

#[tokio::test]
async fn create_rejection_is_reported_with_vendor_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/button/Prepare"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "invalid token"})))
        .mount(&server)
        .await;

    let h = harness(payphone(&server, 2_000));
    let b = h.with_booking(BookingPaymentStatus::Rejected).await;

    let result = h.flow.create_payment(b.id, b.customer.user_id).await.unwrap();
    assert!(!result.success);
    assert_eq!(result.status_code, Some(401));
    assert_eq!(result.error_kind, Some(ErrorKind::VendorRejection));
    assert_eq!(h.status_of(b.id).await, BookingPaymentStatus::Rejected);
}

#[tokio::test]
async fn create_rejects_paid_and_foreign_bookings() {
    let h = harness(Arc::new(MockPaymentVendor::new("ALWAYS_SUCCESS")));
    let paid = h.with_booking(BookingPaymentStatus::Approved).await;
    let open = h.with_booking(BookingPaymentStatus::Pending).await;

    let err = h.flow.create_payment(paid.id, paid.customer.user_id).await.unwrap_err();
    assert!(matches!(err, FlowError::AlreadyPaid));

    let err = h.flow.create_payment(open.id, Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, FlowError::Forbidden));

    let err = h.flow.create_payment(Uuid::new_v4(), Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, FlowError::NotFound(_)));
}

#[tokio::test]
async fn create_never_approves() {
    for behavior in ["ALWAYS_SUCCESS", "ALWAYS_FAILURE", "ALWAYS_TIMEOUT"] {
        let h = harness(Arc::new(MockPaymentVendor::new(behavior)));
        let b = h.with_booking(BookingPaymentStatus::Pending).await;
        let _ = h.flow.create_payment(b.id, b.customer.user_id).await.unwrap();
        assert_ne!(h.status_of(b.id).await, BookingPaymentStatus::Approved, "{}", behavior);
    }
}

#[tokio::test]
async fn verify_sends_numeric_id_and_approves() {
    let server = MockServer::start().await;
    let h = harness(payphone(&server, 2_000));
    let b = h.with_booking(BookingPaymentStatus::AwaitingConfirmation).await;

    Mock::given(method("POST"))
        .and(path("/api/button/V2/Confirm"))
        .and(body_partial_json(json!({"id": 123456, "clientTxId": b.id.to_string()})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"statusCode": 3, "transactionStatus": "Approved"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let result = h
        .flow
        .verify_payment("123456", b.id, Some(b.customer.user_id))
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(result.status, Some(VendorPaymentStatus::Approved));
    assert_eq!(h.status_of(b.id).await, BookingPaymentStatus::Approved);
    // Customer and provider both hear about it.
    assert_eq!(h.notifier.mailer.sent().len(), 2);
}

#[tokio::test]
async fn verifying_twice_credits_once() {
    let vendor = Arc::new(MockPaymentVendor::new("ALWAYS_SUCCESS"));
    let h = harness(vendor.clone());
    let b = h.with_booking(BookingPaymentStatus::AwaitingConfirmation).await;

    let first = h.flow.verify_payment("T1", b.id, None).await.unwrap();
    let second = h.flow.verify_payment("T1", b.id, None).await.unwrap();

    assert!(first.success && !first.already_processed);
    assert!(second.success && second.already_processed);
    assert_eq!(h.store.approved_payments(b.id).await, 1);
    assert_eq!(h.notifier.mailer.sent().len(), 2);
    assert_eq!(vendor.call_count(), 1);
}

#[tokio::test]
async fn concurrent_verifications_credit_once() {
    let h = harness(Arc::new(MockPaymentVendor::new("ALWAYS_SUCCESS")));
    let b = h.with_booking(BookingPaymentStatus::AwaitingConfirmation).await;

    let (a, c) = tokio::join!(
        h.flow.verify_payment("T1", b.id, None),
        h.flow.verify_payment("T1", b.id, None)
    );
    let results = [a.unwrap(), c.unwrap()];

    assert!(results.iter().all(|r| r.success));
    assert_eq!(results.iter().filter(|r| r.already_processed).count(), 1);
    assert_eq!(h.store.approved_payments(b.id).await, 1);
    assert_eq!(h.notifier.mailer.sent().len(), 2);
}

#[tokio::test]
async fn rejected_verification_notifies_customer() {
    let h = harness(Arc::new(MockPaymentVendor::new("ALWAYS_REJECTED")));
    let b = h.with_booking(BookingPaymentStatus::AwaitingConfirmation).await;

    let result = h.flow.verify_payment("T2", b.id, None).await.unwrap();
    assert!(!result.success);
    assert_eq!(result.status, Some(VendorPaymentStatus::Rejected));
    assert_eq!(h.status_of(b.id).await, BookingPaymentStatus::Rejected);

    let mails = h.notifier.mailer.sent();
    assert_eq!(mails.len(), 1);
    assert_eq!(mails[0].to, vec!["ana@example.com".to_string()]);
    assert!(mails[0].body.contains("Canceled"));
}

#[tokio::test]
async fn pending_verification_keeps_waiting() {
    let h = harness(Arc::new(MockPaymentVendor::new("ALWAYS_PENDING")));
    let b = h.with_booking(BookingPaymentStatus::AwaitingConfirmation).await;

    let result = h.flow.verify_payment("T3", b.id, None).await.unwrap();
    assert!(!result.success);
    assert_eq!(result.status, Some(VendorPaymentStatus::Pending));
    assert_eq!(h.status_of(b.id).await, BookingPaymentStatus::AwaitingConfirmation);
}

#[tokio::test]
async fn verify_vendor_failure_is_a_failed_result() {
    let h = harness(Arc::new(MockPaymentVendor::new("ALWAYS_TIMEOUT")));
    let b = h.with_booking(BookingPaymentStatus::AwaitingConfirmation).await;

    let result = h.flow.verify_payment("T4", b.id, None).await.unwrap();
    assert!(!result.success);
    assert_eq!(result.error_kind, Some(ErrorKind::NetworkError));
    assert_eq!(h.status_of(b.id).await, BookingPaymentStatus::AwaitingConfirmation);
}

#[tokio::test]
async fn callback_requires_both_parameters() {
    let h = harness(Arc::new(MockPaymentVendor::new("ALWAYS_SUCCESS")));
    let b = h.with_booking(BookingPaymentStatus::AwaitingConfirmation).await;

    let err = h
        .flow
        .handle_callback(CallbackParams {
            id: Some("T1".to_string()),
            client_transaction_id: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::Validation(_)));

    let outcome = h
        .flow
        .handle_callback(CallbackParams {
            id: Some("T1".to_string()),
            client_transaction_id: Some(b.id.to_string()),
        })
        .await
        .unwrap();
    assert!(outcome.result.success);
    assert_eq!(
        outcome.redirect_url,
        format!("https://market.test/bookings/{}/?payment=approved", b.id)
    );
}

#[tokio::test]
async fn card_confirmed_after_proof_upload_is_credited() {
    use booking_payments::domain::ports::BookingStore;

    let h = harness(Arc::new(MockPaymentVendor::new("ALWAYS_SUCCESS")));
    let b = h.with_booking(BookingPaymentStatus::ProofSubmitted).await;

    let outcome = h
        .flow
        .handle_callback(CallbackParams {
            id: Some("T7".to_string()),
            client_transaction_id: Some(b.id.to_string()),
        })
        .await
        .unwrap();
    assert!(outcome.result.success);
    assert!(outcome.redirect_url.ends_with("?payment=approved"));
    assert_eq!(h.store.approved_payments(b.id).await, 1);

    let stored = h.store.get_booking(b.id).await.unwrap().unwrap();
    assert_eq!(stored.payment_status, BookingPaymentStatus::Approved);
    assert_eq!(stored.payment_method, Some(PaymentMethodCode::Payphone));
}

#[tokio::test]
async fn rejected_card_keeps_the_submitted_proof() {
    let h = harness(Arc::new(MockPaymentVendor::new("ALWAYS_REJECTED")));
    let b = h.with_booking(BookingPaymentStatus::ProofSubmitted).await;

    let result = h.flow.verify_payment("T8", b.id, None).await.unwrap();
    assert!(!result.success);
    assert_eq!(result.booking_status, Some(BookingPaymentStatus::ProofSubmitted));
    assert_eq!(h.status_of(b.id).await, BookingPaymentStatus::ProofSubmitted);
    assert!(h.notifier.mailer.sent().is_empty());
}

#[tokio::test]
async fn callback_that_cannot_be_confirmed_redirects_as_failed() {
    let h = harness(Arc::new(MockPaymentVendor::new("ALWAYS_SUCCESS")));
    let b = h.with_booking(BookingPaymentStatus::Pending).await;

    let outcome = h
        .flow
        .handle_callback(CallbackParams {
            id: Some("T9".to_string()),
            client_transaction_id: Some(b.id.to_string()),
        })
        .await
        .unwrap();
    assert!(!outcome.result.success);
    assert!(outcome.result.error.is_some());
    assert_eq!(
        outcome.redirect_url,
        format!("https://market.test/bookings/{}/?payment=failed", b.id)
    );
    assert_eq!(h.status_of(b.id).await, BookingPaymentStatus::Pending);
}

#[tokio::test]
async fn bank_transfer_moves_to_review_and_notifies() {
    let h = harness(Arc::new(MockPaymentVendor::new("ALWAYS_SUCCESS")));
    let b = h.with_booking(BookingPaymentStatus::Pending).await;

    let submitted = h
        .flow
        .confirm_bank_transfer(b.id, b.customer.user_id, transfer("0012345678"), today())
        .await
        .unwrap();
    assert_eq!(submitted.booking_status, BookingPaymentStatus::ProofSubmitted);
    assert_eq!(h.status_of(b.id).await, BookingPaymentStatus::ProofSubmitted);

    let proofs = h.store.proofs().await;
    assert_eq!(proofs.len(), 1);
    assert_eq!(proofs[0].reference_number, "0012345678");

    let recipients: Vec<Vec<String>> = h.notifier.mailer.sent().into_iter().map(|m| m.to).collect();
    assert!(recipients.contains(&vec!["ana@example.com".to_string()]));
    assert!(recipients.contains(&vec![ADMIN_EMAIL.to_string()]));
}

#[tokio::test]
async fn bank_transfer_rejects_future_date() {
    let h = harness(Arc::new(MockPaymentVendor::new("ALWAYS_SUCCESS")));
    let b = h.with_booking(BookingPaymentStatus::Pending).await;

    let mut submission = transfer("REF-1");
    submission.transfer_date = today().succ_opt();
    let err = h
        .flow
        .confirm_bank_transfer(b.id, b.customer.user_id, submission, today())
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::Validation(_)));
    assert_eq!(h.status_of(b.id).await, BookingPaymentStatus::Pending);
    assert!(h.store.proofs().await.is_empty());
}

#[tokio::test]
async fn bank_transfer_rejects_bad_receipts() {
    let h = harness(Arc::new(MockPaymentVendor::new("ALWAYS_SUCCESS")));
    let b = h.with_booking(BookingPaymentStatus::Pending).await;

    let mut too_big = transfer("REF-2");
    too_big.receipt = Some(ReceiptFile {
        file_name: "scan.pdf".to_string(),
        content_type: "application/pdf".to_string(),
        bytes: vec![0u8; MAX_RECEIPT_BYTES + 1],
    });
    let mut wrong_type = transfer("REF-3");
    wrong_type.receipt = Some(ReceiptFile {
        file_name: "scan.gif".to_string(),
        content_type: "image/gif".to_string(),
        bytes: vec![0u8; 10],
    });

    for submission in [too_big, wrong_type] {
        let err = h
            .flow
            .confirm_bank_transfer(b.id, b.customer.user_id, submission, today())
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::Validation(_)));
    }
    assert_eq!(h.status_of(b.id).await, BookingPaymentStatus::Pending);
}

#[tokio::test]
async fn reference_only_transfer_uses_same_transition() {
    let h = harness(Arc::new(MockPaymentVendor::new("ALWAYS_SUCCESS")));
    let b = h.with_booking(BookingPaymentStatus::AwaitingConfirmation).await;

    h.flow
        .register_transfer_reference(b.id, b.customer.user_id, "998877")
        .await
        .unwrap();
    assert_eq!(h.status_of(b.id).await, BookingPaymentStatus::ProofSubmitted);

    let err = h
        .flow
        .register_transfer_reference(b.id, b.customer.user_id, "")
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::Validation(_)));
}

#[tokio::test]
async fn review_approves_once() {
    let h = harness(Arc::new(MockPaymentVendor::new("ALWAYS_SUCCESS")));
    let b = h.with_booking(BookingPaymentStatus::ProofSubmitted).await;

    let status = h.flow.review_bank_transfer(b.id, ReviewDecision::Approve).await.unwrap();
    assert_eq!(status, BookingPaymentStatus::Approved);
    assert_eq!(h.store.approved_payments(b.id).await, 1);

    let err = h
        .flow
        .review_bank_transfer(b.id, ReviewDecision::Approve)
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::AlreadyPaid));
    assert_eq!(h.store.approved_payments(b.id).await, 1);
}

#[tokio::test]
async fn review_rejection_allows_a_new_attempt() {
    let h = harness(Arc::new(MockPaymentVendor::new("ALWAYS_SUCCESS")));
    let b = h.with_booking(BookingPaymentStatus::ProofSubmitted).await;

    let status = h
        .flow
        .review_bank_transfer(
            b.id,
            ReviewDecision::Reject {
                reason: "amount does not match".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(status, BookingPaymentStatus::Rejected);

    let retry = h.flow.create_payment(b.id, b.customer.user_id).await.unwrap();
    assert!(retry.success);
    assert_eq!(h.status_of(b.id).await, BookingPaymentStatus::AwaitingConfirmation);
}

#[tokio::test]
async fn review_requires_a_submitted_proof() {
    let h = harness(Arc::new(MockPaymentVendor::new("ALWAYS_SUCCESS")));
    let b = h.with_booking(BookingPaymentStatus::Pending).await;
    let err = h
        .flow
        .review_bank_transfer(b.id, ReviewDecision::Approve)
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::InvalidTransition { .. }));
}

#[tokio::test]
async fn approval_records_payment_method() {
    use booking_payments::domain::ports::BookingStore;

    let h = harness(Arc::new(MockPaymentVendor::new("ALWAYS_SUCCESS")));
    let b = h.with_booking(BookingPaymentStatus::ProofSubmitted).await;
    h.flow.review_bank_transfer(b.id, ReviewDecision::Approve).await.unwrap();

    let stored = h.store.get_booking(b.id).await.unwrap().unwrap();
    assert_eq!(stored.payment_method, Some(PaymentMethodCode::BankTransfer));
}
