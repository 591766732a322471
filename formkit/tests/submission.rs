//! End-to-end submission tests
//!
//! Each test renders a form (writing its state into the session), posts a
//! multipart body to the submission endpoint, and inspects the session and
//! upload store afterwards.

use async_trait::async_trait;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use formkit::config::FormsConfig;
use formkit::delivery::{DeliveryContext, DeliveryError, DeliveryHandler};
use formkit::forms::{Form, FormAttributes, FormOptions, FormState};
use formkit::FormKit;
use http::header::REFERER;
use http::{HeaderValue, StatusCode};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct CountingHandler {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl DeliveryHandler for CountingHandler {
    async fn deliver(&self, _form: &FormState, _ctx: &DeliveryContext) -> Result<(), DeliveryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Harness {
    kit: FormKit,
    server: TestServer,
    calls: Arc<AtomicUsize>,
    _temp: tempfile::TempDir,
}

fn harness() -> Harness {
    let temp = tempfile::TempDir::new().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let config = FormsConfig {
        upload_path: temp.path().to_path_buf(),
        ..FormsConfig::default()
    };
    let kit = FormKit::builder(config)
        .register_handler("count", Arc::new(CountingHandler { calls: calls.clone() }))
        .build()
        .unwrap();
    let server = TestServer::new(formkit::routes::router(kit.clone())).unwrap();
    Harness { kit, server, calls, _temp: temp }
}

/// Render a contact form and return `(form id, CSRF token)`
async fn render_contact(kit: &FormKit, rule: &str) -> (String, String) {
    let mut form = Form::open(
        kit,
        "/contact",
        FormAttributes::new(),
        FormOptions::new().handler("count"),
    )
    .await
    .unwrap();
    let _ = form.open_tag();
    let _ = form.text("name", None, &[], Some(rule));
    let id = form.id().to_string();
    let token = form.state().csrf_token.clone().unwrap();
    form.close().await.unwrap();
    (id, token)
}

/// Render a form with a required text field and an optional file field
async fn render_with_file(kit: &FormKit, file_rule: &str) -> (String, String) {
    let mut form = Form::open(
        kit,
        "/contact",
        FormAttributes::new(),
        FormOptions::new().handler("count"),
    )
    .await
    .unwrap();
    let _ = form.open_tag();
    let _ = form.text("name", None, &[], Some("required"));
    let _ = form.file("cv", &[], Some(file_rule));
    let id = form.id().to_string();
    let token = form.state().csrf_token.clone().unwrap();
    form.close().await.unwrap();
    (id, token)
}

fn upload_dirs(kit: &FormKit) -> usize {
    std::fs::read_dir(kit.config().upload_path.clone())
        .unwrap()
        .count()
}

#[tokio::test]
async fn test_successful_submission_clears_slot_and_sets_flag() {
    let h = harness();
    let (id, token) = render_contact(&h.kit, "required").await;

    let response = h
        .server
        .post(&format!("/forms/{id}"))
        .add_header(REFERER, HeaderValue::from_static("/contact"))
        .multipart(
            MultipartForm::new()
                .add_text("_token", token)
                .add_text("name", "Ada Lovelace"),
        )
        .await;

    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(response.header("location"), "/contact");
    assert_eq!(h.calls.load(Ordering::SeqCst), 1);

    // Slot is gone, success flag reads once through the next render
    assert!(h.kit.form_states().load(&id).await.unwrap().is_none());
    let form = Form::open(
        &h.kit,
        "/contact",
        FormAttributes::new(),
        FormOptions::new().handler("count"),
    )
    .await
    .unwrap();
    assert!(form.succeeded());
}

#[tokio::test]
async fn test_validation_failure_flashes_errors_and_keeps_values() {
    let h = harness();
    let (id, token) = render_contact(&h.kit, "required|email").await;

    let response = h
        .server
        .post(&format!("/forms/{id}"))
        .add_header(REFERER, HeaderValue::from_static("/contact"))
        .multipart(
            MultipartForm::new()
                .add_text("_token", token)
                .add_text("name", "not-an-email"),
        )
        .await;

    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(h.calls.load(Ordering::SeqCst), 0);

    let state = h.kit.form_states().load(&id).await.unwrap().unwrap();
    assert_eq!(state.value("name"), Some("not-an-email"));
    assert!(!state.errors.is_empty());

    // The re-rendered field repopulates the rejected value and shows the error
    let mut form = Form::open(
        &h.kit,
        "/contact",
        FormAttributes::new(),
        FormOptions::new().handler("count"),
    )
    .await
    .unwrap();
    let summary = form.errors("Please fix the errors below.", "invalid");
    assert!(summary.contains("email"));
    let field = form.text("name", None, &[], Some("required|email"));
    assert!(field.contains("not-an-email"));
    assert!(field.contains("invalid"));
}

#[tokio::test]
async fn test_csrf_mismatch_is_forbidden() {
    let h = harness();
    let (id, _token) = render_contact(&h.kit, "required").await;

    let response = h
        .server
        .post(&format!("/forms/{id}"))
        .multipart(
            MultipartForm::new()
                .add_text("_token", "forged")
                .add_text("name", "Ada"),
        )
        .await;

    response.assert_status(StatusCode::FORBIDDEN);
    assert_eq!(h.calls.load(Ordering::SeqCst), 0);

    // The forged post left no trace in the slot
    let state = h.kit.form_states().load(&id).await.unwrap().unwrap();
    assert_eq!(state.value("name"), None);
}

#[tokio::test]
async fn test_missing_token_is_forbidden() {
    let h = harness();
    let (id, _token) = render_contact(&h.kit, "required").await;

    let response = h
        .server
        .post(&format!("/forms/{id}"))
        .multipart(MultipartForm::new().add_text("name", "Ada"))
        .await;

    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_upload_survives_failed_validation_and_is_replaced() {
    let h = harness();
    let (id, token) = render_with_file(&h.kit, "max:64").await;

    // Leaving the required name empty keeps the submission in the session
    let response = h
        .server
        .post(&format!("/forms/{id}"))
        .multipart(
            MultipartForm::new().add_text("_token", token).add_part(
                "cv",
                Part::bytes(b"first version".to_vec())
                    .file_name("cv.pdf")
                    .mime_type("application/pdf"),
            ),
        )
        .await;
    response.assert_status(StatusCode::SEE_OTHER);

    let state = h.kit.form_states().load(&id).await.unwrap().unwrap();
    let first = state.uploads.get("cv").unwrap().clone();
    assert_eq!(first.name, "cv.pdf");
    assert_eq!(h.kit.uploads().read(&first).await.unwrap(), b"first version");
    assert_eq!(upload_dirs(&h.kit), 1);

    // A second post with a new file replaces the stored upload
    let (_, token) = render_with_file(&h.kit, "max:64").await;
    let response = h
        .server
        .post(&format!("/forms/{id}"))
        .multipart(
            MultipartForm::new().add_text("_token", token).add_part(
                "cv",
                Part::bytes(b"second version".to_vec())
                    .file_name("cv-final.pdf")
                    .mime_type("application/pdf"),
            ),
        )
        .await;
    response.assert_status(StatusCode::SEE_OTHER);

    let state = h.kit.form_states().load(&id).await.unwrap().unwrap();
    let second = state.uploads.get("cv").unwrap().clone();
    assert_eq!(second.name, "cv-final.pdf");
    assert!(h.kit.uploads().read(&first).await.is_err());
    assert_eq!(upload_dirs(&h.kit), 1);
}

#[tokio::test]
async fn test_delete_checkbox_removes_stored_upload() {
    let h = harness();
    let (id, token) = render_with_file(&h.kit, "max:64").await;

    let response = h
        .server
        .post(&format!("/forms/{id}"))
        .multipart(
            MultipartForm::new().add_text("_token", token).add_part(
                "cv",
                Part::bytes(b"data".to_vec())
                    .file_name("cv.pdf")
                    .mime_type("application/pdf"),
            ),
        )
        .await;
    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(upload_dirs(&h.kit), 1);

    let (_, token) = render_with_file(&h.kit, "max:64").await;
    let response = h
        .server
        .post(&format!("/forms/{id}"))
        .multipart(
            MultipartForm::new()
                .add_text("_token", token)
                .add_text("delete_cv", "1"),
        )
        .await;
    response.assert_status(StatusCode::SEE_OTHER);

    let state = h.kit.form_states().load(&id).await.unwrap().unwrap();
    assert!(state.uploads.get("cv").is_none());
    assert_eq!(upload_dirs(&h.kit), 0);
}

#[tokio::test]
async fn test_successful_submission_deletes_uploads() {
    let h = harness();
    let (id, token) = render_with_file(&h.kit, "max:64").await;

    let response = h
        .server
        .post(&format!("/forms/{id}"))
        .multipart(
            MultipartForm::new()
                .add_text("_token", token)
                .add_text("name", "Ada")
                .add_part(
                    "cv",
                    Part::bytes(b"data".to_vec())
                        .file_name("cv.pdf")
                        .mime_type("application/pdf"),
                ),
        )
        .await;

    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(h.calls.load(Ordering::SeqCst), 1);
    assert_eq!(upload_dirs(&h.kit), 0);
    assert!(h.kit.form_states().load(&id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_unknown_form_id_fails_csrf() {
    let h = harness();

    // No rendered form means no stored token, so any post is rejected
    let response = h
        .server
        .post("/forms/deadbeefdeadbeefdeadbeefdeadbeef")
        .multipart(MultipartForm::new().add_text("_token", "anything"))
        .await;

    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_forged_token_post_leaves_stored_upload_untouched() {
    let h = harness();
    let (id, token) = render_with_file(&h.kit, "max:64").await;

    // A failed validation leaves the victim's upload in the slot
    let response = h
        .server
        .post(&format!("/forms/{id}"))
        .multipart(
            MultipartForm::new().add_text("_token", token).add_part(
                "cv",
                Part::bytes(b"victim upload".to_vec())
                    .file_name("cv.pdf")
                    .mime_type("application/pdf"),
            ),
        )
        .await;
    response.assert_status(StatusCode::SEE_OTHER);
    let stored = h
        .kit
        .form_states()
        .load(&id)
        .await
        .unwrap()
        .unwrap()
        .uploads
        .get("cv")
        .unwrap()
        .clone();

    // A forged-token post carrying a delete flag and a replacement file is
    // rejected before anything touches the session or the disk
    let response = h
        .server
        .post(&format!("/forms/{id}"))
        .multipart(
            MultipartForm::new()
                .add_text("_token", "forged")
                .add_text("delete_cv", "1")
                .add_part(
                    "cv",
                    Part::bytes(b"attacker file".to_vec())
                        .file_name("attack.pdf")
                        .mime_type("application/pdf"),
                ),
        )
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    let state = h.kit.form_states().load(&id).await.unwrap().unwrap();
    assert_eq!(state.uploads.get("cv"), Some(&stored));
    assert_eq!(h.kit.uploads().read(&stored).await.unwrap(), b"victim upload");
    // No orphan directory was written for the rejected file part
    assert_eq!(upload_dirs(&h.kit), 1);
}

#[tokio::test]
async fn test_upload_above_default_extractor_limit_is_accepted() {
    let h = harness();
    let (id, token) = render_with_file(&h.kit, "max:10240").await;

    // 3 MiB is past axum's stock 2 MiB body cap but well within the
    // configured limit and the field's own size rule
    let response = h
        .server
        .post(&format!("/forms/{id}"))
        .multipart(
            MultipartForm::new()
                .add_text("_token", token)
                .add_text("name", "Ada")
                .add_part(
                    "cv",
                    Part::bytes(vec![0u8; 3 * 1024 * 1024])
                        .file_name("portfolio.pdf")
                        .mime_type("application/pdf"),
                ),
        )
        .await;

    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(h.calls.load(Ordering::SeqCst), 1);
    assert_eq!(upload_dirs(&h.kit), 0);
    assert!(h.kit.form_states().load(&id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_file_rules_pruned_when_no_file_posted() {
    let h = harness();
    let (id, token) = render_with_file(&h.kit, "max:64").await;

    // Only the required name is posted; the file field's max rule must not
    // fire against a missing upload
    let response = h
        .server
        .post(&format!("/forms/{id}"))
        .multipart(
            MultipartForm::new()
                .add_text("_token", token)
                .add_text("name", "Ada"),
        )
        .await;

    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(h.calls.load(Ordering::SeqCst), 1);
    assert!(h.kit.form_states().load(&id).await.unwrap().is_none());
}
