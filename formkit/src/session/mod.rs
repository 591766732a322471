//! Session bridge
//!
//! Form state lives in the host application's session between the render and
//! the submission. The [`SessionStore`] trait is the seam: applications back
//! it with whatever session machinery they already run (cookie-scoped stores,
//! Redis, a database). [`MemorySessionStore`] is the default backend and is
//! process-wide; scoping keys to a visitor is the backend's concern.
//!
//! [`FormStateStore`] sits on top of a store and handles the key prefix and
//! the (de)serialization of [`FormState`].

use crate::error::FormKitError;
use crate::forms::FormState;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Key-value session storage holding JSON values
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch the value stored under `key`, if any
    async fn get(&self, key: &str) -> Result<Option<Value>, FormKitError>;

    /// Store `value` under `key`, replacing any previous value
    async fn put(&self, key: &str, value: Value) -> Result<(), FormKitError>;

    /// Remove the value stored under `key` (no-op when absent)
    async fn remove(&self, key: &str) -> Result<(), FormKitError>;
}

/// In-memory session backend
///
/// # Examples
///
/// ```rust
/// use formkit::session::{MemorySessionStore, SessionStore};
/// use serde_json::json;
///
/// # async fn example() -> anyhow::Result<()> {
/// let store = MemorySessionStore::new();
/// store.put("form_abc", json!({"values": {}})).await?;
/// assert!(store.get("form_abc").await?.is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemorySessionStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, FormKitError> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn put(&self, key: &str, value: Value) -> Result<(), FormKitError> {
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), FormKitError> {
        self.entries.write().remove(key);
        Ok(())
    }
}

/// Prefixed, typed access to the form slots of a [`SessionStore`]
///
/// One slot per generated form id: key `<session_prefix><id>` holds the
/// serialized [`FormState`], and `<session_prefix><id>:sent` carries the
/// one-shot success flag set after a completed submission.
#[derive(Clone)]
pub struct FormStateStore {
    store: Arc<dyn SessionStore>,
    prefix: String,
}

impl FormStateStore {
    /// Wrap `store`, prefixing every key with `prefix`
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>, prefix: impl Into<String>) -> Self {
        Self { store, prefix: prefix.into() }
    }

    fn slot_key(&self, id: &str) -> String {
        format!("{}{id}", self.prefix)
    }

    fn sent_key(&self, id: &str) -> String {
        format!("{}{id}:sent", self.prefix)
    }

    /// Load the form state stored for `id`
    ///
    /// A missing slot yields `None`; a slot that no longer deserializes is
    /// treated the same way (stale state is not an error).
    ///
    /// # Errors
    ///
    /// Propagates session backend failures.
    pub async fn load(&self, id: &str) -> Result<Option<FormState>, FormKitError> {
        let Some(raw) = self.store.get(&self.slot_key(id)).await? else {
            return Ok(None);
        };
        match serde_json::from_value(raw) {
            Ok(state) => Ok(Some(state)),
            Err(err) => {
                tracing::warn!(form_id = %id, error = %err, "discarding undecodable form slot");
                Ok(None)
            }
        }
    }

    /// Persist `form` into its slot
    ///
    /// # Errors
    ///
    /// Propagates serialization and session backend failures.
    pub async fn save(&self, form: &FormState) -> Result<(), FormKitError> {
        let value = serde_json::to_value(form)
            .map_err(|err| FormKitError::Session(err.to_string()))?;
        self.store.put(&self.slot_key(&form.id), value).await
    }

    /// Delete the slot for `id`
    ///
    /// # Errors
    ///
    /// Propagates session backend failures.
    pub async fn clear(&self, id: &str) -> Result<(), FormKitError> {
        self.store.remove(&self.slot_key(id)).await
    }

    /// Flag `id` as successfully submitted
    ///
    /// # Errors
    ///
    /// Propagates session backend failures.
    pub async fn mark_sent(&self, id: &str) -> Result<(), FormKitError> {
        self.store.put(&self.sent_key(id), Value::Bool(true)).await
    }

    /// Consume the success flag for `id`, returning whether it was set
    ///
    /// # Errors
    ///
    /// Propagates session backend failures.
    pub async fn take_sent(&self, id: &str) -> Result<bool, FormKitError> {
        let key = self.sent_key(id);
        let sent = self.store.get(&key).await?.is_some();
        if sent {
            self.store.remove(&key).await?;
        }
        Ok(sent)
    }
}
