use crate::domain::identity::Session;
use crate::domain::ports::SessionStore;
use anyhow::Result;
use async_trait::async_trait;
use redis::AsyncCommands;

/// Sessions written by the authentication service as JSON under
/// `session:{id}`.
#[derive(Clone)]
pub struct SessionStoreRedis {
    pub client: redis::Client,
}

impl SessionStoreRedis {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    fn key(session_id: &str) -> String {
        format!("session:{}", session_id)
    }
}

#[async_trait]
impl SessionStore for SessionStoreRedis {
    async fn load(&self, session_id: &str) -> Result<Option<Session>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload: Option<String> = conn.get(Self::key(session_id)).await?;
        match payload {
            Some(p) => Ok(Some(serde_json::from_str::<Session>(&p)?)),
            None => Ok(None),
        }
    }

    async fn clear_legal_auto_accepted(&self, session_id: &str) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = Self::key(session_id);
        let payload: Option<String> = conn.get(&key).await?;
        let Some(payload) = payload else {
            return Ok(());
        };
        // Other services keep their own fields in the same payload.
        let mut session: serde_json::Value = serde_json::from_str(&payload)?;
        if let Some(fields) = session.as_object_mut() {
            fields.insert("legal_auto_accepted".to_string(), serde_json::Value::Bool(false));
        }
        let _: () = redis::cmd("SET")
            .arg(&key)
            .arg(session.to_string())
            .arg("KEEPTTL")
            .query_async(&mut conn)
            .await?;
        Ok(())
    }
}
