use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Provider,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegalDocumentType {
    TermsUser,
    PrivacyUser,
    TermsProvider,
    PrivacyProvider,
}

impl LegalDocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LegalDocumentType::TermsUser => "terms_user",
            LegalDocumentType::PrivacyUser => "privacy_user",
            LegalDocumentType::TermsProvider => "terms_provider",
            LegalDocumentType::PrivacyProvider => "privacy_provider",
        }
    }

    pub fn required_for(role: Role) -> [LegalDocumentType; 2] {
        match role {
            Role::Provider => [LegalDocumentType::TermsProvider, LegalDocumentType::PrivacyProvider],
            _ => [LegalDocumentType::TermsUser, LegalDocumentType::PrivacyUser],
        }
    }
}

/// Session payload written by the authentication service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub user_id: Uuid,
    #[serde(default)]
    pub legal_auto_accepted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub verified: bool,
    pub role: Role,
}

/// Everything the access gates need to know about the caller, resolved once
/// per request before the gate chain runs.
#[derive(Debug, Clone, Default)]
pub struct IdentityState {
    pub user_id: Option<Uuid>,
    pub profile: Option<Profile>,
    pub has_provider_profile: bool,
    pub legal_acceptance_complete: bool,
    pub legal_auto_accepted: bool,
}

impl IdentityState {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    pub fn role(&self) -> Option<Role> {
        self.profile.as_ref().map(|p| p.role)
    }
}

/// Authenticated caller, attached to the request for handlers.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser {
    pub user_id: Uuid,
    pub role: Option<Role>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessGateDecision {
    pub allow: bool,
    pub redirect_target: Option<&'static str>,
}

impl AccessGateDecision {
    pub fn allow() -> Self {
        Self {
            allow: true,
            redirect_target: None,
        }
    }

    pub fn redirect(target: &'static str) -> Self {
        Self {
            allow: false,
            redirect_target: Some(target),
        }
    }
}
