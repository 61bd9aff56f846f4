mod local;
mod memory;

pub use local::LocalStore;
pub use memory::MemoryStore;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("store error: {0}")]
    Internal(String),
}

/// A key-value store for opaque values keyed by string paths.
///
/// Callers persist whole JSON documents per key; the store never looks
/// inside a value.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Write (create or overwrite) a value.
    async fn put(&self, key: &str, data: Bytes) -> Result<(), StoreError>;

    /// Read a value. Returns `StoreError::NotFound` if absent.
    async fn get(&self, key: &str) -> Result<Bytes, StoreError>;

    /// Read a value, returning `None` if it does not exist.
    async fn get_opt(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        match self.get(key).await {
            Ok(data) => Ok(Some(data)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Delete a value. No-op if absent.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// List keys starting with `prefix`, sorted.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Check if a key exists.
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        match self.get(key).await {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Reject keys that are empty or would escape the store root.
pub(crate) fn validate_key(key: &str) -> Result<(), StoreError> {
    if key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|part| part.is_empty() || part == "." || part == "..")
    {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

// -- Key helpers --

pub const PROJECTS_KEY: &str = "llm-app-projects";
pub const MESSAGES_KEY_PREFIX: &str = "messages_";
pub const AUTH_TOKEN_KEY: &str = "auth_token";
pub const CURRENT_USER_KEY: &str = "current_logged_in_user";

pub fn messages_key(project_id: &str) -> String {
    format!("{MESSAGES_KEY_PREFIX}{project_id}")
}

pub fn documents_prefix(project_id: &str) -> String {
    format!("documents/{project_id}/")
}

pub fn document_key(project_id: &str, document_id: &str, filename: &str) -> String {
    format!("documents/{project_id}/{document_id}/{filename}")
}

// -- Configuration --

/// Configuration for the key-value backend.
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    /// Local filesystem base directory. Falls back to the XDG data dir.
    pub local_data_dir: Option<String>,
    /// Keep everything in memory; nothing survives the process.
    pub in_memory: bool,
}

impl StoreConfig {
    /// Build from `DOCCHAT_DATA_DIR` and `DOCCHAT_IN_MEMORY`.
    pub fn from_env() -> Self {
        Self {
            local_data_dir: std::env::var("DOCCHAT_DATA_DIR").ok(),
            in_memory: std::env::var("DOCCHAT_IN_MEMORY")
                .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        }
    }
}

// -- Factory --

/// Create a `KeyValueStore` from configuration.
pub fn create_store(config: &StoreConfig) -> Arc<dyn KeyValueStore> {
    if config.in_memory {
        tracing::debug!("using in-memory store");
        Arc::new(MemoryStore::new())
    } else {
        let store = LocalStore::new(config);
        tracing::debug!(dir = %store.base_dir().display(), "using local store");
        Arc::new(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_helpers_produce_expected_keys() {
        assert_eq!(messages_key("abc-123"), "messages_abc-123");
        assert!(messages_key("abc").starts_with(MESSAGES_KEY_PREFIX));
        assert_eq!(
            document_key("p1", "d1", "notes.pdf"),
            "documents/p1/d1/notes.pdf"
        );
        assert!(document_key("p1", "d1", "x").starts_with(&documents_prefix("p1")));
    }

    #[test]
    fn validate_key_rejects_escapes() {
        assert!(validate_key("messages_p1").is_ok());
        assert!(validate_key("documents/p1/d1/a.txt").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("/etc/passwd").is_err());
        assert!(validate_key("documents/../../x").is_err());
        assert!(validate_key("a//b").is_err());
    }

    #[tokio::test]
    async fn create_store_in_memory() {
        let store = create_store(&StoreConfig {
            local_data_dir: None,
            in_memory: true,
        });
        store.put("k", Bytes::from("v")).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_ref(), b"v");
    }

    #[tokio::test]
    async fn create_store_local_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let store = create_store(&StoreConfig {
            local_data_dir: Some(tmp.path().to_string_lossy().to_string()),
            in_memory: false,
        });
        store.put("k", Bytes::from("v")).await.unwrap();
        assert!(tmp.path().join("k").exists());
    }

    // Env vars are process-global; keep every scenario in one test.
    #[test]
    fn store_config_from_env_scenarios() {
        use std::sync::Mutex;
        static ENV_LOCK: Mutex<()> = Mutex::new(());
        let _guard = ENV_LOCK.lock().unwrap();

        std::env::remove_var("DOCCHAT_DATA_DIR");
        std::env::remove_var("DOCCHAT_IN_MEMORY");
        let config = StoreConfig::from_env();
        assert!(config.local_data_dir.is_none());
        assert!(!config.in_memory);

        std::env::set_var("DOCCHAT_DATA_DIR", "/tmp/docchat-test");
        std::env::set_var("DOCCHAT_IN_MEMORY", "true");
        let config = StoreConfig::from_env();
        assert_eq!(config.local_data_dir.as_deref(), Some("/tmp/docchat-test"));
        assert!(config.in_memory);

        std::env::set_var("DOCCHAT_IN_MEMORY", "0");
        assert!(!StoreConfig::from_env().in_memory);

        std::env::remove_var("DOCCHAT_DATA_DIR");
        std::env::remove_var("DOCCHAT_IN_MEMORY");
    }
}
