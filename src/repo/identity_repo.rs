use crate::domain::identity::{LegalDocumentType, Profile, Role};
use crate::domain::ports::{IdentityDirectory, ProfileRecord};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Clone)]
pub struct IdentityRepo {
    pub pool: PgPool,
}

fn parse_role(raw: &str) -> Result<Role> {
    match raw {
        "customer" => Ok(Role::Customer),
        "provider" => Ok(Role::Provider),
        "admin" => Ok(Role::Admin),
        other => Err(anyhow!("unknown role {}", other)),
    }
}

#[async_trait]
impl IdentityDirectory for IdentityRepo {
    async fn profile(&self, user_id: Uuid) -> Result<Option<ProfileRecord>> {
        let row = sqlx::query(
            r#"
            SELECT p.role, p.verified,
                   EXISTS (SELECT 1 FROM provider_profiles pp WHERE pp.user_id = p.user_id) AS has_provider_profile
            FROM profiles p
            WHERE p.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(r) = row else {
            return Ok(None);
        };
        let role: String = r.get("role");
        Ok(Some(ProfileRecord {
            profile: Profile {
                verified: r.get("verified"),
                role: parse_role(&role)?,
            },
            has_provider_profile: r.get("has_provider_profile"),
        }))
    }

    async fn legal_acceptance_complete(&self, user_id: Uuid, role: Role) -> Result<bool> {
        let required: Vec<String> = LegalDocumentType::required_for(role)
            .iter()
            .map(|d| d.as_str().to_string())
            .collect();

        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS missing
            FROM legal_documents d
            WHERE d.document_type = ANY($2)
              AND d.is_published = TRUE
              AND d.is_active = TRUE
              AND NOT EXISTS (
                  SELECT 1 FROM legal_acceptances a
                  WHERE a.user_id = $1 AND a.document_id = d.id
              )
            "#,
        )
        .bind(user_id)
        .bind(&required)
        .fetch_one(&self.pool)
        .await?;

        let missing: i64 = row.get("missing");
        Ok(missing == 0)
    }
}
