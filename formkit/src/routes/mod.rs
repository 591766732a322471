//! Submission endpoint
//!
//! One route handles every form: `POST /<route_prefix>/{id}`. The id keys
//! back into the session slot written when the form was rendered, so the
//! endpoint knows the form's rules, options, and prior uploads without any
//! per-form registration.

use crate::error::FormKitError;
use crate::forms::{FormState, CSRF_FORM_FIELD, DELETE_FIELD_PREFIX};
use crate::state::FormKit;
use crate::storage::UploadedFile;
use crate::validate;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::post;
use axum::Router;
use http::header::REFERER;
use http::HeaderMap;
use tower_http::trace::TraceLayer;

/// Build the router exposing the submission endpoint
///
/// The body limit comes from `max_upload_bytes` in the configuration, so
/// uploads the validation rules would accept are not cut off by the extractor
/// first.
///
/// # Examples
///
/// ```rust,no_run
/// use formkit::config::FormsConfig;
/// use formkit::FormKit;
///
/// # async fn example() -> anyhow::Result<()> {
/// let kit = FormKit::builder(FormsConfig::default()).build()?;
/// let app = formkit::routes::router(kit);
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```
#[must_use]
pub fn router(kit: FormKit) -> Router {
    let path = format!("/{}/{{id}}", kit.config().route_prefix);
    Router::new()
        .route(&path, post(submit))
        .layer(DefaultBodyLimit::max(kit.config().max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(kit)
}

/// Where to send the browser after handling the post
fn back(headers: &HeaderMap) -> Redirect {
    let target = headers
        .get(REFERER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("/");
    Redirect::to(target)
}

/// Parsed multipart body, held in memory until the CSRF token is verified
///
/// Nothing here has touched the session or the upload store yet; a rejected
/// request must leave both exactly as it found them.
struct Submission {
    token: Option<String>,
    values: Vec<(String, String)>,
    files: Vec<(String, UploadedFile)>,
    deletes: Vec<String>,
}

async fn submit(
    State(kit): State<FormKit>,
    Path(id): Path<String>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Response, FormKitError> {
    let sessions = kit.form_states();
    let mut form = sessions.load(&id).await?.unwrap_or_else(|| FormState {
        id: id.clone(),
        ..FormState::default()
    });

    let submission = read_multipart(multipart).await?;

    match (&form.csrf_token, submission.token.as_deref()) {
        (Some(expected), Some(posted)) if expected.as_str() == posted => {}
        _ => {
            tracing::warn!(form_id = %id, "rejecting post with bad CSRF token");
            return Err(FormKitError::Csrf);
        }
    }

    apply_submission(&kit, &mut form, submission).await?;

    // The submitted values survive a validation failure, so the re-rendered
    // form can repopulate its fields.
    sessions.save(&form).await?;

    validate::prune_file_rules(&mut form);
    let errors = validate::run(&form);
    if !errors.is_empty() {
        tracing::debug!(form_id = %id, errors = errors.len(), "submission failed validation");
        form.errors = errors;
        sessions.save(&form).await?;
        return Ok(back(&headers).into_response());
    }

    let handlers = kit.registry().resolve(&form.options)?;
    let ctx = kit.delivery_context();
    for handler in handlers {
        handler.deliver(&form, &ctx).await?;
    }

    for upload in form.uploads.values() {
        kit.uploads().delete(upload).await?;
    }
    sessions.clear(&id).await?;
    sessions.mark_sent(&id).await?;
    tracing::info!(form_id = %id, route = %kit.config().route_name, "form submitted");

    Ok(back(&headers).into_response())
}

/// Read the multipart body into a [`Submission`] without side effects
async fn read_multipart(mut multipart: Multipart) -> Result<Submission, FormKitError> {
    let mut submission = Submission {
        token: None,
        values: Vec::new(),
        files: Vec::new(),
        deletes: Vec::new(),
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| FormKitError::BadRequest(err.to_string()))?
    {
        let Some(name) = field.name().map(ToString::to_string) else {
            continue;
        };

        if let Some(filename) = field.file_name().map(ToString::to_string) {
            let data = field
                .bytes()
                .await
                .map_err(|err| FormKitError::BadRequest(err.to_string()))?;
            // Browsers post an empty file part when no file was chosen
            if filename.is_empty() || data.is_empty() {
                continue;
            }
            submission
                .files
                .push((name, UploadedFile::new(filename, data.to_vec())));
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|err| FormKitError::BadRequest(err.to_string()))?;

        if name == CSRF_FORM_FIELD {
            submission.token = Some(value);
        } else if let Some(target) = name.strip_prefix(DELETE_FIELD_PREFIX) {
            if validate::is_truthy(&value) {
                submission.deletes.push(target.to_string());
            }
        } else {
            submission.values.push((name, value));
        }
    }

    Ok(submission)
}

/// Apply a verified submission to the form state
///
/// Delete flags remove stored uploads, fresh files replace the stored upload
/// for their field, and everything else overwrites `values`.
async fn apply_submission(
    kit: &FormKit,
    form: &mut FormState,
    submission: Submission,
) -> Result<(), FormKitError> {
    for target in &submission.deletes {
        if let Some(previous) = form.uploads.remove(target) {
            kit.uploads().delete(&previous).await?;
        }
    }

    for (name, file) in submission.files {
        if let Some(previous) = form.uploads.remove(&name) {
            kit.uploads().delete(&previous).await?;
        }
        let stored = kit.uploads().store(file).await?;
        form.uploads.insert(name, stored);
    }

    for (name, value) in submission.values {
        form.values.insert(name, value);
    }
    Ok(())
}
