//! Minimal contact form application
//!
//! Renders a contact form at `/contact` and serves the submission endpoint.
//! Submissions are delivered to the log handler. Run with:
//!
//! ```sh
//! cargo run --example contact_form
//! ```

use axum::extract::State;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use formkit::config::FormsConfig;
use formkit::forms::{Form, FormAttributes, FormOptions};
use formkit::{FormKit, FormKitError};
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    formkit::observability::init()?;

    let kit = FormKit::builder(FormsConfig::load()?).build()?;
    let _sweeper = formkit::gc::spawn_sweeper(kit.clone(), Duration::from_secs(3600));

    let app = Router::new()
        .route("/contact", get(contact_page))
        .with_state(kit.clone())
        .merge(formkit::routes::router(kit));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
    tracing::info!("listening on http://127.0.0.1:3000/contact");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn contact_page(State(kit): State<FormKit>) -> Result<Html<String>, FormKitError> {
    let mut form = Form::open(
        &kit,
        "/contact",
        FormAttributes::new().class("contact"),
        FormOptions::default().log_channel("contact"),
    )
    .await?;

    let mut html = String::from("<!doctype html><title>Contact</title>");
    if form.succeeded() {
        html.push_str("<p>Thanks, we got your message.</p>");
    }
    html.push_str(&form.open_tag());
    html.push_str(&form.errors("Please fix the errors below.", "error"));
    html.push_str("<label>Name ");
    html.push_str(&form.text("name", None, &[], Some("required|max:120")));
    html.push_str("</label><label>Email ");
    html.push_str(&form.email("email", None, &[], Some("required|email")));
    html.push_str("</label><label>Message ");
    html.push_str(&form.textarea("message", None, &[("rows", "6")], Some("required")));
    html.push_str("</label><label>Attachment ");
    html.push_str(&form.file("attachment", &[], Some("max:2048")));
    html.push_str("</label>");
    html.push_str(&form.submit("Send", &[]));
    html.push_str(&form.close().await?);

    Ok(Html(html))
}
