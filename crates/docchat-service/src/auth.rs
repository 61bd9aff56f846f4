use std::sync::Arc;

use bytes::Bytes;
use docchat_store::{KeyValueStore, AUTH_TOKEN_KEY, CURRENT_USER_KEY};

use crate::{HttpClient, ServiceError};

/// The logged-in user's email and bearer token, kept in the key-value store.
pub struct AuthSession {
    store: Arc<dyn KeyValueStore>,
}

impl AuthSession {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Log in against the remote API and remember the returned token.
    pub async fn login(
        &self,
        client: &HttpClient,
        email: &str,
        user_type: &str,
    ) -> Result<String, ServiceError> {
        let resp = client.login(email, user_type).await?;
        if resp.token.is_empty() {
            return Err(ServiceError::Unauthorized("empty token".into()));
        }
        self.save(email, &resp.token).await?;
        tracing::info!(email, user_type, "logged in");
        Ok(resp.token)
    }

    pub async fn save(&self, email: &str, token: &str) -> Result<(), ServiceError> {
        self.store
            .put(CURRENT_USER_KEY, Bytes::copy_from_slice(email.as_bytes()))
            .await?;
        self.store
            .put(AUTH_TOKEN_KEY, Bytes::copy_from_slice(token.as_bytes()))
            .await?;
        Ok(())
    }

    pub async fn token(&self) -> Result<Option<String>, ServiceError> {
        self.read(AUTH_TOKEN_KEY).await
    }

    pub async fn current_user(&self) -> Result<Option<String>, ServiceError> {
        self.read(CURRENT_USER_KEY).await
    }

    pub async fn logout(&self) -> Result<(), ServiceError> {
        self.store.delete(AUTH_TOKEN_KEY).await?;
        self.store.delete(CURRENT_USER_KEY).await?;
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Option<String>, ServiceError> {
        let Some(raw) = self.store.get_opt(key).await? else {
            return Ok(None);
        };
        match String::from_utf8(raw.to_vec()) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!(key, error = %e, "discarding non-utf8 session value");
                Ok(None)
            }
        }
    }
}
