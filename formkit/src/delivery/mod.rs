//! Delivery handlers
//!
//! After a valid submission the collected values and uploads are handed to
//! the delivery handlers named in the form's options, in order. Handlers are
//! looked up in a [`HandlerRegistry`] — an explicit dispatch table, validated
//! when the form is opened so that a typo in a handler name fails at
//! configuration time rather than at dispatch time.
//!
//! Built-ins: [`LogHandler`] (`log`), [`MailHandler`] (`mail`),
//! [`ModelHandler`] (`model`). The reserved name `mailable` dispatches to
//! the custom handler named by
//! [`FormOptions::mailable`](crate::forms::FormOptions::mailable).

mod log;
mod mail;
mod model;

pub use log::LogHandler;
pub use mail::{MailAttachment, MailError, MailHandler, Mailer, OutboundMail, SmtpMailer};
pub use model::ModelHandler;

#[cfg(test)]
pub use mail::MockMailer;

use crate::config::FormsConfig;
use crate::error::FormKitError;
use crate::forms::{FormOptions, FormState};
use crate::storage::{StorageError, UploadStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Reserved handler name resolved through `FormOptions::mailable`
pub const MAILABLE_HANDLER: &str = "mailable";

/// Error raised by a delivery handler
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Mail handler failure
    #[error("mail delivery failed: {0}")]
    Mail(#[from] MailError),

    /// Database handler failure
    #[error("database delivery failed: {0}")]
    Database(#[from] sqlx::Error),

    /// Upload could not be read for attachment
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Handler misconfiguration or custom handler failure
    #[error("{0}")]
    Other(String),
}

/// Shared context handed to handlers during dispatch
#[derive(Clone)]
pub struct DeliveryContext {
    /// Active configuration
    pub config: Arc<FormsConfig>,
    /// Upload storage, for reading attachment contents
    pub uploads: Arc<dyn UploadStore>,
}

/// A named delivery strategy invoked on successful submission
#[async_trait]
pub trait DeliveryHandler: Send + Sync {
    /// Deliver the submitted form
    ///
    /// # Errors
    ///
    /// A returned error aborts the submission with a server error; there is
    /// no retry or partial-success bookkeeping.
    async fn deliver(&self, form: &FormState, ctx: &DeliveryContext) -> Result<(), DeliveryError>;
}

/// Dispatch table mapping handler names to implementations
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn DeliveryHandler>>,
}

impl HandlerRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`, replacing any previous registration
    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn DeliveryHandler>) {
        self.handlers.insert(name.into(), handler);
    }

    /// Whether a handler is registered under `name`
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Check that every handler name in `options` resolves
    ///
    /// # Errors
    ///
    /// Returns [`FormKitError::UnknownHandler`] for the first unresolvable
    /// name.
    pub fn validate(&self, options: &FormOptions) -> Result<(), FormKitError> {
        for name in &options.handlers {
            self.lookup(name, options)?;
        }
        Ok(())
    }

    /// Resolve the handler names in `options` to implementations, in order
    ///
    /// # Errors
    ///
    /// Returns [`FormKitError::UnknownHandler`] for the first unresolvable
    /// name.
    pub fn resolve(
        &self,
        options: &FormOptions,
    ) -> Result<Vec<Arc<dyn DeliveryHandler>>, FormKitError> {
        options
            .handlers
            .iter()
            .map(|name| self.lookup(name, options))
            .collect()
    }

    fn lookup(
        &self,
        name: &str,
        options: &FormOptions,
    ) -> Result<Arc<dyn DeliveryHandler>, FormKitError> {
        let effective = if name == MAILABLE_HANDLER {
            options
                .mailable
                .as_deref()
                .ok_or_else(|| FormKitError::UnknownHandler(MAILABLE_HANDLER.to_string()))?
        } else {
            name
        };
        self.handlers
            .get(effective)
            .cloned()
            .ok_or_else(|| FormKitError::UnknownHandler(effective.to_string()))
    }
}
