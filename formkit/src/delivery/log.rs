//! Log delivery handler

use super::{DeliveryContext, DeliveryError, DeliveryHandler};
use crate::forms::FormState;
use async_trait::async_trait;

/// Writes the submission to the structured log
///
/// The form's `log_channel` option becomes a field on the event, so log
/// pipelines can route on it like a named log channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogHandler;

impl LogHandler {
    /// Create the handler
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DeliveryHandler for LogHandler {
    async fn deliver(&self, form: &FormState, _ctx: &DeliveryContext) -> Result<(), DeliveryError> {
        let values = serde_json::to_string(&form.values)
            .map_err(|err| DeliveryError::Other(err.to_string()))?;
        tracing::info!(
            channel = %form.options.log_channel,
            form_id = %form.id,
            uploads = form.uploads.len(),
            %values,
            "form submission received"
        );
        Ok(())
    }
}
