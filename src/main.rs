use booking_payments::config::AppConfig;
use booking_payments::http::middleware::access_gate::{AccessGateState, GateChain};
use booking_payments::http::middleware::identity::IdentityResolver;
use booking_payments::http::middleware::rate_limit::RateLimitState;
use booking_payments::notifications::templates::TemplateCatalog;
use booking_payments::repo::bookings_repo::BookingsRepo;
use booking_payments::repo::delivery_log_repo::DeliveryLogRepo;
use booking_payments::repo::identity_repo::IdentityRepo;
use booking_payments::repo::session_store_redis::SessionStoreRedis;
use booking_payments::service::notification_dispatch::{DispatchSettings, NotificationDispatch};
use booking_payments::service::payment_flow::PaymentFlow;
use booking_payments::vendors::mailer::HttpMailer;
use booking_payments::vendors::mock::MockPaymentVendor;
use booking_payments::vendors::payphone::PayPhoneGateway;
use booking_payments::vendors::twilio::TwilioMessaging;
use booking_payments::vendors::{PaymentVendor, VendorClient};
use booking_payments::{build_router, AppState};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env();
    cfg.validate()?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&cfg.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let redis_client = redis::Client::open(cfg.redis_url.clone())?;
    let vendor_client = VendorClient::new(cfg.vendor_timeout_ms);

    let payment_vendor: Arc<dyn PaymentVendor> = match cfg.payment_adapter.as_str() {
        "MOCK" => {
            tracing::warn!(behavior = %cfg.mock_behavior, "using mock payment vendor");
            Arc::new(MockPaymentVendor::new(&cfg.mock_behavior))
        }
        _ => Arc::new(PayPhoneGateway::new(&cfg.payphone, vendor_client.clone())),
    };

    if cfg.whatsapp_test_mode {
        tracing::warn!("WHATSAPP_TEST_MODE is on, messages are logged and not sent");
    }

    let notifications = NotificationDispatch::new(
        Arc::new(TemplateCatalog::standard(&cfg.whatsapp_content_sids)),
        Arc::new(TwilioMessaging::new(&cfg.twilio, vendor_client.clone())),
        Arc::new(HttpMailer::new(&cfg.mail, vendor_client)),
        Arc::new(DeliveryLogRepo { pool: pool.clone() }),
        DispatchSettings {
            transport: cfg.messaging_transport,
            test_mode: cfg.whatsapp_test_mode,
            admin_emails: cfg.admin_emails.clone(),
        },
    );

    let payment_flow = PaymentFlow::new(
        Arc::new(BookingsRepo { pool: pool.clone() }),
        payment_vendor,
        notifications.clone(),
        cfg.callback_urls(),
    );

    let sessions = Arc::new(SessionStoreRedis::new(redis_client.clone()));
    let state = AppState {
        payment_flow,
        notifications,
        identity: IdentityResolver {
            sessions: sessions.clone(),
            directory: Arc::new(IdentityRepo { pool: pool.clone() }),
            cookie_name: cfg.session_cookie.clone(),
        },
        gates: AccessGateState {
            chain: Arc::new(GateChain::standard()),
            sessions,
        },
        admin_key: cfg.internal_api_key.clone(),
        rate_limit: Some(RateLimitState {
            redis_client: redis_client.clone(),
            max_per_minute: cfg.rate_limit_per_minute,
        }),
        pool: Some(pool),
        redis_client: Some(redis_client),
    };

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    tracing::info!("listening on {}", cfg.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
