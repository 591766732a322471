//! Form rendering and per-form state
//!
//! A [`Form`] is opened for a URL, emits field markup populated from the
//! session, and persists its [`FormState`] on close. The submission endpoint
//! in [`crate::routes`] later reloads that state by id.

mod error;
mod form;
pub(crate) mod render;
mod state;

pub use error::ValidationErrors;
pub use form::Form;
pub use state::{FormAttributes, FormOptions, FormState};

/// Name of the hidden CSRF input rendered inside every form
pub const CSRF_FORM_FIELD: &str = "_token";

/// Prefix of the checkbox that removes a stored upload for a file field
pub const DELETE_FIELD_PREFIX: &str = "delete_";
