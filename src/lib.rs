pub mod config;
pub mod domain {
    pub mod booking;
    pub mod identity;
    pub mod notification;
    pub mod payment;
    pub mod phone;
    pub mod ports;
}
pub mod error;
pub mod http {
    pub mod handlers {
        pub mod notifications;
        pub mod ops;
        pub mod payments;
    }
    pub mod middleware {
        pub mod access_gate;
        pub mod admin_auth;
        pub mod identity;
        pub mod rate_limit;
        pub mod security_headers;
    }
}
pub mod notifications {
    pub mod templates;
}
pub mod repo {
    pub mod bookings_repo;
    pub mod delivery_log_repo;
    pub mod identity_repo;
    pub mod in_memory;
    pub mod session_store_redis;
}
pub mod service {
    pub mod notification_dispatch;
    pub mod payment_flow;
}
pub mod vendors;

use axum::extract::DefaultBodyLimit;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use axum::Router;
use crate::http::handlers::{notifications as notification_handlers, ops, payments};
use crate::http::middleware::access_gate::AccessGateState;
use crate::http::middleware::identity::IdentityResolver;
use crate::http::middleware::rate_limit::RateLimitState;
use crate::http::middleware::{access_gate, admin_auth, identity, rate_limit, security_headers};

/// Multipart bodies carry a receipt of up to 5 MiB plus the text fields.
const BANK_TRANSFER_BODY_LIMIT: usize = domain::payment::MAX_RECEIPT_BYTES + 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub payment_flow: service::payment_flow::PaymentFlow,
    pub notifications: service::notification_dispatch::NotificationDispatch,
    pub identity: IdentityResolver,
    pub gates: AccessGateState,
    pub admin_key: String,
    pub rate_limit: Option<RateLimitState>,
    pub pool: Option<sqlx::PgPool>,
    pub redis_client: Option<redis::Client>,
}

pub fn build_router(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route("/admin/payments/:booking_id/review", post(payments::review_bank_transfer))
        .route(
            "/admin/notifications/messages/:sid",
            get(notification_handlers::message_status),
        )
        .layer(from_fn_with_state(
            state.admin_key.clone(),
            admin_auth::require_internal_api_key,
        ));

    let app = Router::new()
        .route("/health", get(ops::health))
        .route("/ops/readiness", get(ops::readiness))
        .route("/ops/liveness", get(ops::liveness))
        .route("/payments/payphone/create", post(payments::create_payment))
        .route("/payments/payphone/verify", post(payments::verify_payment))
        .route("/payments/payphone/callback", get(payments::payphone_callback))
        .route("/bank-transfer", post(payments::register_transfer_reference))
        .route(
            "/payments/:booking_id/bank-transfer",
            get(payments::bank_transfer_page)
                .post(payments::submit_bank_transfer)
                .layer(DefaultBodyLimit::max(BANK_TRANSFER_BODY_LIMIT)),
        )
        .merge(admin_routes)
        .layer(from_fn_with_state(state.gates.clone(), access_gate::enforce))
        .layer(from_fn_with_state(state.identity.clone(), identity::resolve))
        .layer(from_fn(security_headers::payphone_referrer_policy));

    let app = match state.rate_limit.clone() {
        Some(limits) => app.layer(from_fn_with_state(limits, rate_limit::enforce)),
        None => app,
    };

    app.with_state(state)
}
