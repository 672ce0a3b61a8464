use crate::domain::identity::{CurrentUser, IdentityState};
use crate::domain::ports::{IdentityDirectory, SessionStore};
use crate::error::err;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;

/// Session id read from the request cookie, kept for later middleware.
#[derive(Debug, Clone)]
pub struct SessionId(pub String);

#[derive(Clone)]
pub struct IdentityResolver {
    pub sessions: Arc<dyn SessionStore>,
    pub directory: Arc<dyn IdentityDirectory>,
    pub cookie_name: String,
}

pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl IdentityResolver {
    pub async fn resolve(&self, session_id: Option<&str>) -> anyhow::Result<IdentityState> {
        let Some(session_id) = session_id else {
            return Ok(IdentityState::anonymous());
        };
        let Some(session) = self.sessions.load(session_id).await? else {
            return Ok(IdentityState::anonymous());
        };

        let record = self.directory.profile(session.user_id).await?;
        // Accounts without a profile are never asked for legal consent.
        let legal_acceptance_complete = match &record {
            Some(r) => {
                self.directory
                    .legal_acceptance_complete(session.user_id, r.profile.role)
                    .await?
            }
            None => true,
        };

        Ok(IdentityState {
            user_id: Some(session.user_id),
            has_provider_profile: record.as_ref().map(|r| r.has_provider_profile).unwrap_or(false),
            profile: record.map(|r| r.profile),
            legal_acceptance_complete,
            legal_auto_accepted: session.legal_auto_accepted,
        })
    }
}

/// Resolves the caller once per request and attaches [`IdentityState`],
/// [`SessionId`] and, when signed in, [`CurrentUser`].
pub async fn resolve(State(resolver): State<IdentityResolver>, mut request: Request<Body>, next: Next) -> Response {
    let session_id = cookie_value(request.headers(), &resolver.cookie_name);
    let identity = match resolver.resolve(session_id.as_deref()).await {
        Ok(identity) => identity,
        Err(e) => {
            tracing::error!("identity resolution failed: {}", e);
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(err("IDENTITY_UNAVAILABLE", "could not resolve session")),
            )
                .into_response();
        }
    };

    if let Some(user_id) = identity.user_id {
        request.extensions_mut().insert(CurrentUser {
            user_id,
            role: identity.role(),
        });
    }
    if let Some(id) = session_id {
        request.extensions_mut().insert(SessionId(id));
    }
    request.extensions_mut().insert(identity);
    next.run(request).await
}
