mod common;

use booking_payments::config::MessagingTransport;
use booking_payments::domain::notification::{EventType, NotificationEvent, Recipient, RecipientRole, Transport};
use booking_payments::error::{DispatchError, ErrorKind};
use booking_payments::notifications::templates::TemplateCatalog;
use booking_payments::repo::in_memory::InMemoryDeliveryLog;
use booking_payments::service::notification_dispatch::{DispatchSettings, NotificationDispatch, TEST_MODE_MESSAGE_ID};
use booking_payments::vendors::mock::{RecordedMessage, RecordingMailer, RecordingMessaging};
use common::{content_sids, notifier, notifier_with, ADMIN_EMAIL};
use std::collections::BTreeMap;
use std::sync::Arc;

fn vars(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

fn approved_event(phone: Option<&str>) -> NotificationEvent {
    NotificationEvent {
        event_type: EventType::PaymentApproved,
        recipient_role: RecipientRole::Customer,
        template_key: "payment_approved".to_string(),
        recipient: Recipient {
            name: Some("Ana Torres".to_string()),
            email: Some("ana@example.com".to_string()),
            phone: phone.map(str::to_string),
        },
        variables: vars(&[
            ("customer_name", "Ana Torres"),
            ("service_name", "Home cleaning"),
            ("amount", "25.50"),
            ("booking_id", "b-1"),
            ("booking_url", "https://market.test/bookings/b-1/"),
        ]),
    }
}

#[tokio::test]
async fn whatsapp_template_gets_positional_variables() {
    let n = notifier();
    let result = n.dispatch.dispatch(&approved_event(Some("0999123456"))).await.unwrap();

    assert!(result.accepted);
    assert_eq!(result.transport, Transport::WhatsApp);
    assert_eq!(result.recipient, "whatsapp:+593999123456");

    let sent = n.messaging.sent();
    assert_eq!(sent.len(), 1);
    match &sent[0] {
        RecordedMessage::Template {
            to,
            content_sid,
            variables,
        } => {
            assert_eq!(to, "whatsapp:+593999123456");
            assert_eq!(content_sid, &content_sids()["payment_approved"]);
            assert_eq!(variables, &vars(&[("1", "Ana Torres"), ("2", "Home cleaning")]));
        }
        other => panic!("unexpected message {:?}", other),
    }

    let entries = n.log.entries().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, "sent");
    assert_eq!(entries[0].message_type, "payment_approved");
    assert_eq!(entries[0].message_id, result.message_id);
    assert!(n.mailer.sent().is_empty());
}

#[tokio::test]
async fn missing_variable_fails_before_any_vendor_call() {
    let n = notifier();
    let mut event = approved_event(Some("0999123456"));
    event.variables.remove("service_name");

    let err = n.dispatch.dispatch(&event).await.unwrap_err();
    assert!(matches!(err, DispatchError::Validation(_)));
    assert_eq!(err.kind(), ErrorKind::ValidationError);
    assert!(n.messaging.sent().is_empty());
    assert!(n.log.entries().await.is_empty());
}

struct Unconfigured {
    dispatch: NotificationDispatch,
    messaging: Arc<RecordingMessaging>,
    mailer: Arc<RecordingMailer>,
    log: Arc<InMemoryDeliveryLog>,
}

fn without_content_sids() -> Unconfigured {
    let messaging = Arc::new(RecordingMessaging::default());
    let mailer = Arc::new(RecordingMailer::default());
    let log = Arc::new(InMemoryDeliveryLog::new());
    let dispatch = NotificationDispatch::new(
        Arc::new(TemplateCatalog::standard(&BTreeMap::new())),
        messaging.clone(),
        mailer.clone(),
        log.clone(),
        DispatchSettings {
            transport: MessagingTransport::WhatsApp,
            test_mode: false,
            admin_emails: vec![ADMIN_EMAIL.to_string()],
        },
    );
    Unconfigured {
        dispatch,
        messaging,
        mailer,
        log,
    }
}

#[tokio::test]
async fn placeholder_content_sid_without_email_is_a_configuration_error() {
    let n = without_content_sids();
    let mut event = approved_event(Some("0999123456"));
    event.recipient.email = None;

    let err = n.dispatch.dispatch(&event).await.unwrap_err();
    assert!(matches!(err, DispatchError::Configuration(_)));
    assert!(n.messaging.sent().is_empty());
    assert!(n.mailer.sent().is_empty());
}

#[tokio::test]
async fn placeholder_content_sid_falls_back_to_email() {
    let n = without_content_sids();
    let result = n.dispatch.dispatch(&approved_event(Some("0999123456"))).await.unwrap();

    assert!(result.accepted);
    assert_eq!(result.transport, Transport::Email);
    assert!(n.messaging.sent().is_empty());
    let mails = n.mailer.sent();
    assert_eq!(mails.len(), 1);
    assert_eq!(mails[0].to, vec!["ana@example.com".to_string()]);
    assert_eq!(n.log.entries().await.len(), 1);
}

#[tokio::test]
async fn test_mode_skips_the_vendor() {
    let n = notifier_with(RecordingMessaging::default(), MessagingTransport::WhatsApp, true);
    let result = n.dispatch.dispatch(&approved_event(Some("0999123456"))).await.unwrap();

    assert!(result.accepted);
    assert_eq!(result.message_id.as_deref(), Some(TEST_MODE_MESSAGE_ID));
    assert!(n.messaging.sent().is_empty());
    assert_eq!(n.log.entries().await.len(), 1);
}

#[tokio::test]
async fn vendor_rejection_carries_code_and_hint() {
    let n = notifier_with(RecordingMessaging::rejecting(63016), MessagingTransport::WhatsApp, false);
    let result = n.dispatch.dispatch(&approved_event(Some("0999123456"))).await.unwrap();

    assert!(!result.accepted);
    assert_eq!(result.error_code, Some(63016));
    let message = result.error_message.unwrap();
    assert!(message.contains("24h window"), "{}", message);

    let entries = n.log.entries().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, "failed");
}

#[tokio::test]
async fn recipient_without_phone_gets_email() {
    let n = notifier();
    let result = n.dispatch.dispatch(&approved_event(None)).await.unwrap();

    assert_eq!(result.transport, Transport::Email);
    let mails = n.mailer.sent();
    assert_eq!(mails.len(), 1);
    assert_eq!(mails[0].to, vec!["ana@example.com".to_string()]);
    assert!(mails[0].subject.contains("b-1"));
    assert!(mails[0].body.contains("$25.50"));
}

#[tokio::test]
async fn template_without_whatsapp_falls_back_to_email() {
    let n = notifier();
    let event = NotificationEvent {
        event_type: EventType::PaymentProofReceived,
        recipient_role: RecipientRole::Customer,
        template_key: "payment_proof_received".to_string(),
        recipient: Recipient {
            name: None,
            email: Some("ana@example.com".to_string()),
            phone: Some("0999123456".to_string()),
        },
        variables: vars(&[
            ("customer_name", "Ana"),
            ("service_name", "Home cleaning"),
            ("amount", "25.50"),
            ("booking_id", "b-1"),
        ]),
    };

    let result = n.dispatch.dispatch(&event).await.unwrap();
    assert_eq!(result.transport, Transport::Email);
    assert!(n.messaging.sent().is_empty());
}

#[tokio::test]
async fn admin_events_go_to_admin_addresses() {
    let n = notifier();
    let event = NotificationEvent {
        event_type: EventType::PaymentPendingReview,
        recipient_role: RecipientRole::Admin,
        template_key: "payment_pending_review".to_string(),
        recipient: Recipient::default(),
        variables: vars(&[("booking_id", "b-1"), ("customer_name", "Ana"), ("amount", "25.50")]),
    };

    let result = n.dispatch.dispatch(&event).await.unwrap();
    assert!(result.accepted);
    assert_eq!(result.recipient, ADMIN_EMAIL);
    assert_eq!(n.mailer.sent()[0].to, vec![ADMIN_EMAIL.to_string()]);
}

#[tokio::test]
async fn no_address_is_a_validation_error() {
    let n = notifier();
    let mut event = approved_event(None);
    event.recipient.email = None;

    let err = n.dispatch.dispatch(&event).await.unwrap_err();
    assert!(matches!(err, DispatchError::Validation(_)));
}

#[tokio::test]
async fn unknown_template_is_a_configuration_error() {
    let n = notifier();
    let mut event = approved_event(Some("0999123456"));
    event.template_key = "birthday_greeting".to_string();

    let err = n.dispatch.dispatch(&event).await.unwrap_err();
    assert!(matches!(err, DispatchError::Configuration(_)));
}

#[tokio::test]
async fn sms_transport_renders_body() {
    let n = notifier_with(RecordingMessaging::default(), MessagingTransport::Sms, false);
    let result = n.dispatch.dispatch(&approved_event(Some("0999123456"))).await.unwrap();

    assert_eq!(result.transport, Transport::Sms);
    assert_eq!(
        n.messaging.sent(),
        vec![RecordedMessage::Sms {
            to: "+593999123456".to_string(),
            body: "Payment confirmed: Ana Torres paid for Home cleaning.".to_string(),
        }]
    );
}

#[tokio::test]
async fn status_lookup_updates_the_log() {
    let n = notifier();
    let result = n.dispatch.dispatch(&approved_event(Some("0999123456"))).await.unwrap();
    let sid = result.message_id.unwrap();

    let report = n.dispatch.message_status(&sid).await.unwrap();
    assert_eq!(report.raw_status, "delivered");

    let entries = n.log.entries().await;
    assert_eq!(entries[0].status, "delivered");
}
