use crate::domain::notification::{DeliveryLogEntry, DeliveryStatus};
use crate::domain::ports::DeliveryLog;
use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;

#[derive(Clone)]
pub struct DeliveryLogRepo {
    pub pool: PgPool,
}

#[async_trait]
impl DeliveryLog for DeliveryLogRepo {
    async fn record(&self, entry: &DeliveryLogEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notification_logs (
                recipient, transport, message_type, status, message_id, response, error_message, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&entry.recipient)
        .bind(entry.transport.as_str())
        .bind(&entry.message_type)
        .bind(&entry.status)
        .bind(&entry.message_id)
        .bind(&entry.response)
        .bind(&entry.error_message)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_status(
        &self,
        message_id: &str,
        status: DeliveryStatus,
        error_message: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE notification_logs
            SET status = $2, error_message = COALESCE($3, error_message), updated_at = NOW()
            WHERE message_id = $1
            "#,
        )
        .bind(message_id)
        .bind(status.as_str())
        .bind(error_message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
