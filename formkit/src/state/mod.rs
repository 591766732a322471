//! Shared application state
//!
//! [`FormKit`] bundles the configuration, session backend, upload store, and
//! handler registry behind `Arc`s so it can be cloned into the axum router
//! and into background tasks. It is assembled once at startup through
//! [`FormKitBuilder`], which wires the built-in handlers from the backends
//! it is given.

use crate::config::FormsConfig;
use crate::delivery::{
    DeliveryContext, DeliveryHandler, HandlerRegistry, LogHandler, MailHandler, Mailer,
    ModelHandler,
};
use crate::error::FormKitError;
use crate::session::{FormStateStore, MemorySessionStore, SessionStore};
use crate::storage::{LocalUploadStore, UploadStore};
use sqlx::PgPool;
use std::sync::Arc;

/// Cloneable handle to everything the forms machinery needs
///
/// # Examples
///
/// ```rust
/// use formkit::config::FormsConfig;
/// use formkit::FormKit;
///
/// # fn example() -> anyhow::Result<()> {
/// let kit = FormKit::builder(FormsConfig::default()).build()?;
/// let router = formkit::routes::router(kit);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct FormKit {
    config: Arc<FormsConfig>,
    sessions: Arc<dyn SessionStore>,
    uploads: Arc<dyn UploadStore>,
    registry: Arc<HandlerRegistry>,
}

impl FormKit {
    /// Start building a kit around `config`
    #[must_use]
    pub fn builder(config: FormsConfig) -> FormKitBuilder {
        FormKitBuilder {
            config,
            sessions: None,
            uploads: None,
            mailer: None,
            pool: None,
            custom: Vec::new(),
        }
    }

    /// The active configuration
    #[must_use]
    pub fn config(&self) -> &FormsConfig {
        &self.config
    }

    /// The upload store
    #[must_use]
    pub fn uploads(&self) -> &Arc<dyn UploadStore> {
        &self.uploads
    }

    /// The delivery dispatch table
    #[must_use]
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Prefixed form-state access over the session backend
    #[must_use]
    pub fn form_states(&self) -> FormStateStore {
        FormStateStore::new(self.sessions.clone(), self.config.session_prefix.clone())
    }

    /// The context handed to delivery handlers
    #[must_use]
    pub fn delivery_context(&self) -> DeliveryContext {
        DeliveryContext {
            config: self.config.clone(),
            uploads: self.uploads.clone(),
        }
    }
}

/// Builder assembling a [`FormKit`] from its backends
///
/// `log` is always registered. `mail` and `model` are registered when a
/// mailer or database pool is supplied, so a form naming an unwired handler
/// fails validation when it is opened.
pub struct FormKitBuilder {
    config: FormsConfig,
    sessions: Option<Arc<dyn SessionStore>>,
    uploads: Option<Arc<dyn UploadStore>>,
    mailer: Option<Arc<dyn Mailer>>,
    pool: Option<PgPool>,
    custom: Vec<(String, Arc<dyn DeliveryHandler>)>,
}

impl FormKitBuilder {
    /// Use `store` as the session backend instead of the in-memory default
    #[must_use]
    pub fn session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.sessions = Some(store);
        self
    }

    /// Use `store` for uploads instead of local disk under `upload_path`
    #[must_use]
    pub fn upload_store(mut self, store: Arc<dyn UploadStore>) -> Self {
        self.uploads = Some(store);
        self
    }

    /// Wire the `mail` handler through `mailer`
    #[must_use]
    pub fn mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    /// Wire the `model` handler through `pool`
    #[must_use]
    pub fn database(mut self, pool: PgPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Register a custom delivery handler under `name`
    #[must_use]
    pub fn register_handler(
        mut self,
        name: impl Into<String>,
        handler: Arc<dyn DeliveryHandler>,
    ) -> Self {
        self.custom.push((name.into(), handler));
        self
    }

    /// Assemble the kit
    ///
    /// # Errors
    ///
    /// Returns [`FormKitError::Storage`] when the default local upload store
    /// cannot create its root directory.
    pub fn build(self) -> Result<FormKit, FormKitError> {
        let uploads: Arc<dyn UploadStore> = match self.uploads {
            Some(store) => store,
            None => Arc::new(LocalUploadStore::new(self.config.upload_path.clone())?),
        };
        let sessions = self
            .sessions
            .unwrap_or_else(|| Arc::new(MemorySessionStore::new()));

        let mut registry = HandlerRegistry::new();
        registry.register("log", Arc::new(LogHandler::new()));
        if let Some(mailer) = self.mailer {
            registry.register("mail", Arc::new(MailHandler::new(mailer)));
        }
        if let Some(pool) = self.pool {
            registry.register("model", Arc::new(ModelHandler::new(pool)));
        }
        for (name, handler) in self.custom {
            registry.register(name, handler);
        }

        Ok(FormKit {
            config: Arc::new(self.config),
            sessions,
            uploads,
            registry: Arc::new(registry),
        })
    }
}
