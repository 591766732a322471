//! Model delivery handler
//!
//! Persists the submitted values as a JSON document in a Postgres table. The
//! target table and column come from the form's options, so one handler
//! instance serves every model-backed form in the application.

use super::{DeliveryContext, DeliveryError, DeliveryHandler};
use crate::forms::FormState;
use async_trait::async_trait;
use sqlx::PgPool;

/// Default column the JSON payload is written to
const DEFAULT_COLUMN: &str = "payload";

/// Inserts the submission into the table named by the form options
pub struct ModelHandler {
    pool: PgPool,
}

impl ModelHandler {
    /// Create the handler around a connection pool
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build the insert statement for the form's target table and column
    ///
    /// Table and column names cannot be bound as parameters, so they are
    /// restricted to plain identifiers before being quoted into the SQL.
    fn insert_sql(form: &FormState) -> Result<String, DeliveryError> {
        let table = form
            .options
            .model
            .as_deref()
            .ok_or_else(|| DeliveryError::Other("model handler requires a table name".into()))?;
        let column = form.options.model_column.as_deref().unwrap_or(DEFAULT_COLUMN);

        for name in [table, column] {
            if !is_identifier(name) {
                return Err(DeliveryError::Other(format!(
                    "invalid identifier for model handler: {name}"
                )));
            }
        }
        Ok(format!("INSERT INTO \"{table}\" (\"{column}\") VALUES ($1)"))
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[async_trait]
impl DeliveryHandler for ModelHandler {
    async fn deliver(&self, form: &FormState, _ctx: &DeliveryContext) -> Result<(), DeliveryError> {
        let sql = Self::insert_sql(form)?;
        let payload = serde_json::json!({
            "form_id": form.id,
            "values": form.values,
            "uploads": form.uploads,
        });

        sqlx::query(&sql).bind(payload).execute(&self.pool).await?;
        tracing::debug!(form_id = %form.id, "submission persisted");
        Ok(())
    }
}
