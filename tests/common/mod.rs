#![allow(dead_code)]

use booking_payments::config::{CallbackUrls, MessagingTransport};
use booking_payments::domain::booking::{Booking, BookingPaymentStatus, Party};
use booking_payments::notifications::templates::TemplateCatalog;
use booking_payments::repo::in_memory::{InMemoryBookingStore, InMemoryDeliveryLog};
use booking_payments::service::notification_dispatch::{DispatchSettings, NotificationDispatch};
use booking_payments::service::payment_flow::PaymentFlow;
use booking_payments::vendors::mock::{RecordingMailer, RecordingMessaging};
use booking_payments::vendors::PaymentVendor;
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

pub const BASE_URL: &str = "https://market.test";
pub const ADMIN_EMAIL: &str = "ops@market.test";

pub fn party(name: &str, email: &str) -> Party {
    Party {
        user_id: Uuid::new_v4(),
        name: name.to_string(),
        email: Some(email.to_string()),
        phone: None,
    }
}

pub fn booking(status: BookingPaymentStatus) -> Booking {
    Booking {
        id: Uuid::new_v4(),
        customer: party("Ana Torres", "ana@example.com"),
        provider: party("Luis Vega", "luis@example.com"),
        service_name: "Home cleaning".to_string(),
        scheduled_at: Utc.with_ymd_and_hms(2026, 5, 4, 15, 0, 0).unwrap(),
        total_cost: Decimal::new(2550, 2),
        payment_status: status,
        payment_method: None,
    }
}

pub fn content_sids() -> BTreeMap<String, String> {
    [
        ("booking_created", "HX00000000000000000000000000000001"),
        ("booking_accepted", "HX00000000000000000000000000000002"),
        ("payment_approved", "HX00000000000000000000000000000003"),
        ("service_reminder", "HX00000000000000000000000000000004"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

pub struct Notifier {
    pub dispatch: NotificationDispatch,
    pub messaging: Arc<RecordingMessaging>,
    pub mailer: Arc<RecordingMailer>,
    pub log: Arc<InMemoryDeliveryLog>,
}

pub fn notifier_with(messaging: RecordingMessaging, transport: MessagingTransport, test_mode: bool) -> Notifier {
    let messaging = Arc::new(messaging);
    let mailer = Arc::new(RecordingMailer::default());
    let log = Arc::new(InMemoryDeliveryLog::new());
    let dispatch = NotificationDispatch::new(
        Arc::new(TemplateCatalog::standard(&content_sids())),
        messaging.clone(),
        mailer.clone(),
        log.clone(),
        DispatchSettings {
            transport,
            test_mode,
            admin_emails: vec![ADMIN_EMAIL.to_string()],
        },
    );
    Notifier {
        dispatch,
        messaging,
        mailer,
        log,
    }
}

pub fn notifier() -> Notifier {
    notifier_with(RecordingMessaging::default(), MessagingTransport::WhatsApp, false)
}

pub struct Harness {
    pub flow: PaymentFlow,
    pub store: InMemoryBookingStore,
    pub notifier: Notifier,
}

pub fn harness(vendor: Arc<dyn PaymentVendor>) -> Harness {
    let store = InMemoryBookingStore::new();
    let notifier = notifier();
    let flow = PaymentFlow::new(
        Arc::new(store.clone()),
        vendor,
        notifier.dispatch.clone(),
        CallbackUrls {
            base: BASE_URL.to_string(),
        },
    );
    Harness { flow, store, notifier }
}

impl Harness {
    pub async fn with_booking(&self, status: BookingPaymentStatus) -> Booking {
        let b = booking(status);
        self.store.insert_booking(b.clone()).await;
        b
    }

    pub async fn status_of(&self, booking_id: Uuid) -> BookingPaymentStatus {
        use booking_payments::domain::ports::BookingStore;
        self.store
            .get_booking(booking_id)
            .await
            .unwrap()
            .unwrap()
            .payment_status
    }
}
