//! formkit: session-backed HTML form building and submission handling
//!
//! A form opened for a URL renders its fields, records its validation rules
//! and delivery options into the session, and posts to a single shared
//! endpoint. On submission the endpoint reloads that state by id, validates
//! against the recorded rules, and either flashes the errors back for a
//! re-render or hands the values and uploads to the configured delivery
//! handlers.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use formkit::config::FormsConfig;
//! use formkit::forms::{Form, FormAttributes, FormOptions};
//! use formkit::FormKit;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     formkit::observability::init()?;
//!     let kit = FormKit::builder(FormsConfig::load()?).build()?;
//!
//!     // Render a form (normally inside a page handler)
//!     let mut form = Form::open(
//!         &kit,
//!         "/contact",
//!         FormAttributes::new().class("contact"),
//!         FormOptions::default(),
//!     )
//!     .await?;
//!     let mut html = form.open_tag();
//!     html.push_str(&form.text("name", None, &[], Some("required|max:120")));
//!     html.push_str(&form.email("email", None, &[], Some("required|email")));
//!     html.push_str(&form.submit("Send", &[]));
//!     html.push_str(&form.close().await?);
//!
//!     // Serve the submission endpoint
//!     let app = formkit::routes::router(kit);
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod delivery;
pub mod error;
pub mod forms;
pub mod gc;
pub mod observability;
pub mod routes;
pub mod session;
pub mod state;
pub mod storage;
pub mod validate;

pub use error::FormKitError;
pub use state::{FormKit, FormKitBuilder};

pub mod prelude {
    //! Convenience re-exports for common types

    pub use crate::config::FormsConfig;
    pub use crate::delivery::{
        DeliveryContext, DeliveryError, DeliveryHandler, HandlerRegistry, LogHandler, MailHandler,
        Mailer, ModelHandler, SmtpMailer,
    };
    pub use crate::error::FormKitError;
    pub use crate::forms::{Form, FormAttributes, FormOptions, FormState, ValidationErrors};
    pub use crate::routes::router;
    pub use crate::session::{FormStateStore, MemorySessionStore, SessionStore};
    pub use crate::state::{FormKit, FormKitBuilder};
    pub use crate::storage::{LocalUploadStore, StoredUpload, UploadStore, UploadedFile};
}
