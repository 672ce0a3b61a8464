use crate::domain::identity::{AccessGateDecision, IdentityState, Role};
use crate::domain::ports::SessionStore;
use crate::http::middleware::identity::SessionId;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

pub const EMAIL_PENDING_TARGET: &str = "/email-verification-pending/";
pub const LEGAL_CONSENT_TARGET: &str = "/legal/consent/";
pub const PROVIDER_PROFILE_TARGET: &str = "/provider/complete-profile-google/";

const EMAIL_ALLOWED_PREFIXES: [&str; 7] = [
    "/logout",
    "/admin/",
    "/api/",
    "/static/",
    "/media/",
    "/email-verification-pending",
    "/verify-email/",
];

const LEGAL_EXEMPT_PREFIXES: [&str; 7] = [
    "/legal/",
    "/login",
    "/logout",
    "/verify-email/",
    "/email-verification-pending",
    "/provider/complete-profile-google",
    "/customer/complete-profile-google",
];

// The email gate's target is listed too, otherwise an unverified provider
// without a profile bounces between the two targets.
const PROVIDER_ALLOWED_PREFIXES: [&str; 7] = [
    "/provider/complete-profile-google/",
    "/logout/",
    "/accounts/logout/",
    "/static/",
    "/media/",
    "/email-verification-pending",
    "/verify-email/",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateVerdict {
    Continue,
    ContinueConsumingLegalFlag,
    Redirect(&'static str),
}

pub type Gate = fn(&IdentityState, &str) -> GateVerdict;

fn starts_with_any(path: &str, prefixes: &[&str]) -> bool {
    prefixes.iter().any(|p| path.starts_with(p))
}

pub fn email_verification_gate(identity: &IdentityState, path: &str) -> GateVerdict {
    let Some(profile) = identity.profile.as_ref() else {
        return GateVerdict::Continue;
    };
    if !identity.is_authenticated() || profile.verified || starts_with_any(path, &EMAIL_ALLOWED_PREFIXES) {
        return GateVerdict::Continue;
    }
    GateVerdict::Redirect(EMAIL_PENDING_TARGET)
}

pub fn legal_acceptance_gate(identity: &IdentityState, path: &str) -> GateVerdict {
    if !identity.is_authenticated() {
        return GateVerdict::Continue;
    }
    if identity.legal_auto_accepted {
        return GateVerdict::ContinueConsumingLegalFlag;
    }
    if path == "/" || starts_with_any(path, &LEGAL_EXEMPT_PREFIXES) {
        return GateVerdict::Continue;
    }
    if identity.legal_acceptance_complete {
        GateVerdict::Continue
    } else {
        GateVerdict::Redirect(LEGAL_CONSENT_TARGET)
    }
}

pub fn provider_profile_gate(identity: &IdentityState, path: &str) -> GateVerdict {
    if !identity.is_authenticated()
        || identity.role() != Some(Role::Provider)
        || identity.has_provider_profile
        || starts_with_any(path, &PROVIDER_ALLOWED_PREFIXES)
    {
        return GateVerdict::Continue;
    }
    GateVerdict::Redirect(PROVIDER_PROFILE_TARGET)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateOutcome {
    pub decision: AccessGateDecision,
    pub consume_legal_flag: bool,
}

/// Ordered gates; the first redirect wins.
#[derive(Clone)]
pub struct GateChain {
    gates: Vec<(&'static str, Gate)>,
}

impl GateChain {
    pub fn new(gates: Vec<(&'static str, Gate)>) -> Self {
        Self { gates }
    }

    pub fn standard() -> Self {
        Self::new(vec![
            ("email_verification", email_verification_gate as Gate),
            ("legal_acceptance", legal_acceptance_gate as Gate),
            ("provider_profile", provider_profile_gate as Gate),
        ])
    }

    pub fn evaluate(&self, identity: &IdentityState, path: &str) -> GateOutcome {
        let mut consume_legal_flag = false;
        for (name, gate) in &self.gates {
            match gate(identity, path) {
                GateVerdict::Continue => {}
                GateVerdict::ContinueConsumingLegalFlag => consume_legal_flag = true,
                GateVerdict::Redirect(target) => {
                    tracing::debug!(gate = *name, path, target, "access gate redirect");
                    return GateOutcome {
                        decision: AccessGateDecision::redirect(target),
                        consume_legal_flag,
                    };
                }
            }
        }
        GateOutcome {
            decision: AccessGateDecision::allow(),
            consume_legal_flag,
        }
    }
}

#[derive(Clone)]
pub struct AccessGateState {
    pub chain: Arc<GateChain>,
    pub sessions: Arc<dyn SessionStore>,
}

pub async fn enforce(State(state): State<AccessGateState>, request: Request<Body>, next: Next) -> Response {
    let identity = request
        .extensions()
        .get::<IdentityState>()
        .cloned()
        .unwrap_or_default();
    let outcome = state.chain.evaluate(&identity, request.uri().path());

    if outcome.consume_legal_flag {
        if let Some(SessionId(session_id)) = request.extensions().get::<SessionId>() {
            if let Err(e) = state.sessions.clear_legal_auto_accepted(session_id).await {
                tracing::warn!("could not clear legal flag: {}", e);
            }
        }
    }

    match outcome.decision.redirect_target {
        Some(target) => (StatusCode::SEE_OTHER, [(header::LOCATION, target)]).into_response(),
        None => next.run(request).await,
    }
}
