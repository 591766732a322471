//! Configuration for formkit
//!
//! Settings are loaded from multiple sources with clear precedence:
//!
//! 1. Environment variables (highest priority, `FORMKIT_` prefix)
//! 2. `./formkit.toml`
//! 3. Hardcoded defaults (fallback)
//!
//! # Example Configuration
//!
//! ```toml
//! # formkit.toml
//! route_prefix = "forms"
//! session_prefix = "form_"
//! upload_path = "./form_uploads"
//! gc_grace_secs = 86400
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use formkit::config::FormsConfig;
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = FormsConfig::load()?;
//! let path = config.submit_path("4f2a");
//! assert!(path.starts_with("/forms/"));
//! # Ok(())
//! # }
//! ```

use crate::error::FormKitError;
use figment::providers::{Data, Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for the form builder and submission endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FormsConfig {
    /// First path segment of the submission route (`POST /<route_prefix>/{id}`)
    pub route_prefix: String,

    /// Logical route name, used in log output
    pub route_name: String,

    /// Prefix applied to every session key holding form state
    pub session_prefix: String,

    /// Directory uploads are written to while a form is in flight
    pub upload_path: PathBuf,

    /// Maximum accepted request body size in bytes for the submission route
    pub max_upload_bytes: usize,

    /// Age in seconds after which abandoned uploads are garbage-collected
    pub gc_grace_secs: u64,
}

impl Default for FormsConfig {
    fn default() -> Self {
        Self {
            route_prefix: "forms".to_string(),
            route_name: "formkit.submit".to_string(),
            session_prefix: "form_".to_string(),
            upload_path: PathBuf::from("./form_uploads"),
            max_upload_bytes: 16 * 1024 * 1024,
            gc_grace_secs: 86400, // 24 hours
        }
    }
}

impl FormsConfig {
    /// Load configuration from `./formkit.toml` and `FORMKIT_` environment
    /// variables, layered over the defaults
    ///
    /// # Errors
    ///
    /// Returns [`FormKitError::Config`] if a source is present but malformed.
    pub fn load() -> Result<Self, FormKitError> {
        Self::figment(Toml::file("formkit.toml")).extract().map_err(from_figment)
    }

    /// Load configuration from a specific TOML file
    ///
    /// Environment variables still take precedence over the file.
    ///
    /// # Errors
    ///
    /// Returns [`FormKitError::Config`] if the file or environment is malformed.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, FormKitError> {
        Self::figment(Toml::file(path.as_ref())).extract().map_err(from_figment)
    }

    fn figment(file: Data<Toml>) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(file)
            .merge(Env::prefixed("FORMKIT_"))
    }

    /// Path the submission endpoint for `id` is mounted at
    #[must_use]
    pub fn submit_path(&self, id: &str) -> String {
        format!("/{}/{id}", self.route_prefix.trim_matches('/'))
    }

    /// Session key holding the serialized form state for `id`
    #[must_use]
    pub fn session_key(&self, id: &str) -> String {
        format!("{}{id}", self.session_prefix)
    }
}

fn from_figment(err: figment::Error) -> FormKitError {
    FormKitError::Config(err.to_string())
}
