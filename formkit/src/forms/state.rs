//! Form state, attributes, and controller options

use super::ValidationErrors;
use crate::storage::StoredUpload;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Ordered `<form>` tag attributes
///
/// Attributes merge over the defaults in insertion order: setting a name that
/// already exists replaces its value in place, new names append.
///
/// # Examples
///
/// ```rust
/// use formkit::forms::FormAttributes;
///
/// let attrs = FormAttributes::new()
///     .class("contact-form")
///     .set("data-module", "contact");
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormAttributes {
    entries: Vec<(String, String)>,
}

impl FormAttributes {
    /// Create an empty attribute set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an attribute, replacing a previous value for the same name
    #[must_use]
    pub fn set(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = value;
        } else {
            self.entries.push((name, value));
        }
        self
    }

    /// Set the `action` attribute (overrides the computed submission URL)
    #[must_use]
    pub fn action(self, action: impl Into<String>) -> Self {
        self.set("action", action)
    }

    /// Set the `method` attribute
    #[must_use]
    pub fn method(self, method: impl Into<String>) -> Self {
        self.set("method", method)
    }

    /// Set the `class` attribute
    #[must_use]
    pub fn class(self, class: impl Into<String>) -> Self {
        self.set("class", class)
    }

    /// Set the `id` attribute
    #[must_use]
    pub fn id(self, id: impl Into<String>) -> Self {
        self.set("id", id)
    }

    /// Merge these attributes over `defaults`, returning the combined list
    #[must_use]
    pub fn merged_over(self, defaults: Self) -> Vec<(String, String)> {
        let mut merged = defaults;
        for (name, value) in self.entries {
            merged = merged.set(name, value);
        }
        merged.entries
    }

    /// The attribute list in order
    #[must_use]
    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }
}

/// Delivery options recorded when the form is opened
///
/// The `handlers` list names entries of the
/// [`HandlerRegistry`](crate::delivery::HandlerRegistry), invoked in order
/// after a valid submission. The special name `mailable` resolves through
/// [`FormOptions::mailable`] to a custom registered handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormOptions {
    /// Registry names invoked in order on successful submission
    pub handlers: Vec<String>,

    /// Channel label attached to `log` handler output
    pub log_channel: String,

    /// Recipients for the `mail` handler
    pub mail_to: Vec<String>,

    /// Blind-carbon-copy recipients for the `mail` handler
    pub mail_bcc: Vec<String>,

    /// Subject for the `mail` handler; defaults to one derived from the form id
    pub mail_subject: Option<String>,

    /// Registry name a `mailable` handler entry resolves to
    pub mailable: Option<String>,

    /// Table the `model` handler inserts into
    pub model: Option<String>,

    /// Column the `model` handler writes the JSON payload to
    pub model_column: Option<String>,
}

impl Default for FormOptions {
    fn default() -> Self {
        Self {
            handlers: vec!["log".to_string()],
            log_channel: "forms".to_string(),
            mail_to: Vec::new(),
            mail_bcc: Vec::new(),
            mail_subject: None,
            mailable: None,
            model: None,
            model_column: None,
        }
    }
}

impl FormOptions {
    /// Options with an empty handler list
    #[must_use]
    pub fn new() -> Self {
        Self { handlers: Vec::new(), ..Self::default() }
    }

    /// Append a handler name
    #[must_use]
    pub fn handler(mut self, name: impl Into<String>) -> Self {
        self.handlers.push(name.into());
        self
    }

    /// Set the log channel
    #[must_use]
    pub fn log_channel(mut self, channel: impl Into<String>) -> Self {
        self.log_channel = channel.into();
        self
    }

    /// Append a mail recipient
    #[must_use]
    pub fn mail_to(mut self, address: impl Into<String>) -> Self {
        self.mail_to.push(address.into());
        self
    }

    /// Append a BCC recipient
    #[must_use]
    pub fn mail_bcc(mut self, address: impl Into<String>) -> Self {
        self.mail_bcc.push(address.into());
        self
    }

    /// Set the mail subject
    #[must_use]
    pub fn mail_subject(mut self, subject: impl Into<String>) -> Self {
        self.mail_subject = Some(subject.into());
        self
    }

    /// Name the custom handler a `mailable` entry dispatches to
    #[must_use]
    pub fn mailable(mut self, name: impl Into<String>) -> Self {
        self.mailable = Some(name.into());
        self
    }

    /// Set the table and column the `model` handler writes to
    #[must_use]
    pub fn model(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.model = Some(table.into());
        self.model_column = Some(column.into());
        self
    }
}

/// The in-session record tracking one form instance
///
/// Created on render, persisted on [`Form::close`](super::Form::close),
/// reloaded and mutated on each submission, deleted after successful handler
/// dispatch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FormState {
    /// Deterministic id derived from the session prefix and the form's URL
    pub id: String,

    /// Ordered `<form>` tag attributes
    pub attributes: Vec<(String, String)>,

    /// Delivery options
    pub options: FormOptions,

    /// Field name to validation rule string
    pub rules: BTreeMap<String, String>,

    /// Field name to last submitted value
    pub values: BTreeMap<String, String>,

    /// Field name to stored upload reference
    pub uploads: BTreeMap<String, StoredUpload>,

    /// Names rendered as file inputs; their rules are pruned at submission
    /// time when no file is present
    pub file_fields: Vec<String>,

    /// Per-form CSRF token, rendered as a hidden input and checked on post
    pub csrf_token: Option<String>,

    /// Error bag from the last failed submission; consumed on re-render
    pub errors: ValidationErrors,
}

impl FormState {
    /// Compute the deterministic form id for a URL
    ///
    /// Lowercase hex SHA-256 of `session_prefix + url`, truncated to 32
    /// characters. Re-rendering the same URL therefore reuses the same
    /// session slot.
    #[must_use]
    pub fn form_id(session_prefix: &str, url: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(session_prefix.as_bytes());
        hasher.update(url.as_bytes());
        let digest = hasher.finalize();
        let mut id = hex::encode(digest);
        id.truncate(32);
        id
    }

    /// Last submitted value for `name`, if any
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Whether `name` was rendered as a file input
    #[must_use]
    pub fn is_file_field(&self, name: &str) -> bool {
        self.file_fields.iter().any(|f| f == name)
    }

    /// Record `name` as a file input
    pub fn register_file_field(&mut self, name: &str) {
        if !self.is_file_field(name) {
            self.file_fields.push(name.to_string());
        }
    }
}
