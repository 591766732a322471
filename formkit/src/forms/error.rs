//! Per-field validation error bag

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Validation error messages keyed by field name
///
/// Stored in the form slot after a failed submission so the next render can
/// show the messages, both as a summary list and inline next to the fields.
///
/// # Examples
///
/// ```rust
/// use formkit::forms::ValidationErrors;
///
/// let mut errors = ValidationErrors::new();
/// errors.add("email", "The email field is required.");
/// assert_eq!(errors.first("email"), Some("The email field is required."));
/// assert!(!errors.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors {
    errors: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    /// Create an empty bag
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message for `field`
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.entry(field.into()).or_default().push(message.into());
    }

    /// All messages recorded for `field`
    #[must_use]
    pub fn field(&self, field: &str) -> &[String] {
        self.errors.get(field).map_or(&[], Vec::as_slice)
    }

    /// First message recorded for `field`, if any
    #[must_use]
    pub fn first(&self, field: &str) -> Option<&str> {
        self.errors.get(field).and_then(|msgs| msgs.first()).map(String::as_str)
    }

    /// Whether any message has been recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Total number of messages across all fields
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.values().map(Vec::len).sum()
    }

    /// Iterate over `(field, messages)` pairs in field order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.errors.iter().map(|(field, msgs)| (field.as_str(), msgs.as_slice()))
    }
}
