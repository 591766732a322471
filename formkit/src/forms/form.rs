//! The form renderer
//!
//! Lifecycle is caller-enforced: [`Form::open`] loads prior state from the
//! session and emits the opening tag, field builders emit populated markup
//! and record validation rules, [`Form::close`] persists the state and emits
//! the closing tag. No sequencing is validated beyond that.

use super::render;
use super::state::{FormAttributes, FormOptions, FormState};
use super::{ValidationErrors, CSRF_FORM_FIELD, DELETE_FIELD_PREFIX};
use crate::error::FormKitError;
use crate::session::FormStateStore;
use crate::state::FormKit;
use rand::RngCore;

/// A form being rendered for one URL
///
/// # Examples
///
/// ```rust,no_run
/// use formkit::forms::{Form, FormAttributes, FormOptions};
/// # async fn example(kit: &formkit::FormKit) -> anyhow::Result<()> {
/// let mut form = Form::open(
///     kit,
///     "/contact",
///     FormAttributes::new().class("contact-form"),
///     FormOptions::new().handler("log").handler("mail").mail_to("team@example.com"),
/// )
/// .await?;
///
/// let mut html = form.open_tag();
/// html.push_str(&form.errors("Please fix the errors below.", "form-error"));
/// html.push_str(&form.text("name", None, &[], Some("required|max:100")));
/// html.push_str(&form.email("email", None, &[], Some("required|email")));
/// html.push_str(&form.file("attachment", &[], None));
/// html.push_str(&form.submit("Send", &[]));
/// html.push_str(&form.close().await?);
/// # Ok(())
/// # }
/// ```
pub struct Form {
    sessions: FormStateStore,
    state: FormState,
    error_bag: ValidationErrors,
    error_class: String,
    has_file_field: bool,
    sent: bool,
}

impl Form {
    /// Open a form for `url`
    ///
    /// Computes the deterministic form id, loads prior values/uploads/errors
    /// from the session slot, merges `attributes` over the defaults
    /// (`method="POST"`, computed `action`, multipart enctype) and resolves
    /// the handler names in `options` against the registry.
    ///
    /// # Errors
    ///
    /// Returns [`FormKitError::UnknownHandler`] when `options` names an
    /// unregistered handler, or propagates session failures.
    pub async fn open(
        kit: &FormKit,
        url: &str,
        attributes: FormAttributes,
        options: FormOptions,
    ) -> Result<Self, FormKitError> {
        kit.registry().validate(&options)?;

        let config = kit.config();
        let sessions = kit.form_states();
        let id = FormState::form_id(&config.session_prefix, url);

        let sent = sessions.take_sent(&id).await?;
        let mut state = sessions.load(&id).await?.unwrap_or_default();
        state.id = id;
        state.options = options;
        // Rules and file fields are re-registered by the field builders
        state.rules.clear();
        state.file_fields.clear();
        let error_bag = std::mem::take(&mut state.errors);

        let defaults = FormAttributes::new()
            .method("POST")
            .action(config.submit_path(&state.id))
            .set("enctype", "multipart/form-data");
        state.attributes = attributes.merged_over(defaults);
        state.csrf_token = Some(generate_token());

        Ok(Self {
            sessions,
            state,
            error_bag,
            error_class: "form-error".to_string(),
            has_file_field: false,
            sent,
        })
    }

    /// The generated form id
    #[must_use]
    pub fn id(&self) -> &str {
        &self.state.id
    }

    /// Whether the previous submission of this form completed successfully
    ///
    /// The flag is consumed when the form is opened, so it reads true exactly
    /// once after a completed submission.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.sent
    }

    /// The working state (attributes, rules, values, uploads)
    #[must_use]
    pub const fn state(&self) -> &FormState {
        &self.state
    }

    /// Opening `<form>` tag plus the hidden CSRF input
    #[must_use]
    pub fn open_tag(&self) -> String {
        let mut html = format!("<form{}>", render::attr_string(&self.state.attributes));
        if let Some(token) = &self.state.csrf_token {
            html.push_str(&render::void_element(
                "input",
                &owned(&[("type", "hidden"), ("name", CSRF_FORM_FIELD), ("value", token)]),
            ));
        }
        html
    }

    /// Generic `<input>` element
    ///
    /// The rendered value is the session value if one exists, otherwise
    /// `default`. A `rule` string is recorded for submission-time validation.
    pub fn input(
        &mut self,
        name: &str,
        default: Option<&str>,
        attrs: &[(&str, &str)],
        rule: Option<&str>,
    ) -> String {
        self.render_input(None, name, default, attrs, rule)
    }

    /// `<input type="text">` element
    pub fn text(
        &mut self,
        name: &str,
        default: Option<&str>,
        attrs: &[(&str, &str)],
        rule: Option<&str>,
    ) -> String {
        self.render_input(Some("text"), name, default, attrs, rule)
    }

    /// `<input type="email">` element
    pub fn email(
        &mut self,
        name: &str,
        default: Option<&str>,
        attrs: &[(&str, &str)],
        rule: Option<&str>,
    ) -> String {
        self.render_input(Some("email"), name, default, attrs, rule)
    }

    /// `<input type="date">` element
    pub fn date(
        &mut self,
        name: &str,
        default: Option<&str>,
        attrs: &[(&str, &str)],
        rule: Option<&str>,
    ) -> String {
        self.render_input(Some("date"), name, default, attrs, rule)
    }

    /// `<textarea>` element
    pub fn textarea(
        &mut self,
        name: &str,
        default: Option<&str>,
        attrs: &[(&str, &str)],
        rule: Option<&str>,
    ) -> String {
        self.register_rule(name, rule);
        let mut list = owned(attrs);
        upsert(&mut list, "name", name);
        self.apply_error_class(name, &mut list);
        let value = self.field_value(name, default);
        let mut html = render::element("textarea", &list, &render::escape(&value));
        html.push_str(&self.inline_error(name));
        html
    }

    /// `<select>` element with `(value, label)` options
    ///
    /// The option matching the session value (or `default`) is marked
    /// selected.
    pub fn select(
        &mut self,
        name: &str,
        options: &[(&str, &str)],
        default: Option<&str>,
        attrs: &[(&str, &str)],
        rule: Option<&str>,
    ) -> String {
        self.register_rule(name, rule);
        let selected = self.field_value(name, default);

        let mut body = String::new();
        for &(value, label) in options {
            let mut option_attrs = vec![("value".to_string(), value.to_string())];
            if value == selected {
                option_attrs.push(("selected".to_string(), "selected".to_string()));
            }
            body.push_str(&render::element("option", &option_attrs, &render::escape(label)));
        }

        let mut list = owned(attrs);
        upsert(&mut list, "name", name);
        self.apply_error_class(name, &mut list);
        let mut html = render::element("select", &list, &body);
        html.push_str(&self.inline_error(name));
        html
    }

    /// `<input type="file">` element
    ///
    /// When the session already holds an upload for this field, the element
    /// is followed by a note showing the stored file and a
    /// `delete_<name>` checkbox that removes it on the next submission.
    pub fn file(&mut self, name: &str, attrs: &[(&str, &str)], rule: Option<&str>) -> String {
        self.register_rule(name, rule);
        self.state.register_file_field(name);
        self.has_file_field = true;

        let mut list = vec![("type".to_string(), "file".to_string())];
        for &(n, v) in attrs {
            upsert(&mut list, n, v);
        }
        upsert(&mut list, "name", name);
        self.apply_error_class(name, &mut list);
        let mut html = render::void_element("input", &list);

        if let Some(upload) = self.state.uploads.get(name) {
            let checkbox = render::void_element(
                "input",
                &[
                    ("type".to_string(), "checkbox".to_string()),
                    ("name".to_string(), format!("{DELETE_FIELD_PREFIX}{name}")),
                    ("value".to_string(), "1".to_string()),
                ],
            );
            let body = format!(
                "{} ({}) <label>{checkbox} remove</label>",
                render::escape(&upload.name),
                render::human_size(upload.size),
            );
            html.push_str(&render::element(
                "span",
                &owned(&[("class", "form-upload"), ("data-field", name)]),
                &body,
            ));
        }

        html.push_str(&self.inline_error(name));
        html
    }

    /// `<button>` element
    #[must_use]
    pub fn button(&self, label: &str, attrs: &[(&str, &str)]) -> String {
        render::element("button", &owned(attrs), &render::escape(label))
    }

    /// `<input type="submit">` element
    #[must_use]
    pub fn submit(&self, label: &str, attrs: &[(&str, &str)]) -> String {
        let mut list = vec![("type".to_string(), "submit".to_string())];
        for &(n, v) in attrs {
            upsert(&mut list, n, v);
        }
        upsert(&mut list, "value", label);
        render::void_element("input", &list)
    }

    /// Summary list of the validation errors from the last submission
    ///
    /// Also records `css_class` so that subsequent field builders flag erring
    /// fields and inline their first message. Returns an empty string when
    /// the bag is empty.
    pub fn errors(&mut self, message: &str, css_class: &str) -> String {
        self.error_class = css_class.to_string();
        if self.error_bag.is_empty() {
            return String::new();
        }

        let mut items = String::new();
        for (_, messages) in self.error_bag.iter() {
            for msg in messages {
                items.push_str(&render::element("li", &[], &render::escape(msg)));
            }
        }

        let mut html = String::new();
        if !message.is_empty() {
            html.push_str(&render::element(
                "p",
                &owned(&[("class", css_class)]),
                &render::escape(message),
            ));
        }
        html.push_str(&render::element("ul", &owned(&[("class", css_class)]), &items));
        html
    }

    /// Persist the form state to the session and emit the closing tag
    ///
    /// The file-input support script is appended first when a file field was
    /// rendered. The consumed error bag is not written back.
    ///
    /// # Errors
    ///
    /// Propagates session failures.
    pub async fn close(mut self) -> Result<String, FormKitError> {
        self.state.errors = ValidationErrors::new();
        self.sessions.save(&self.state).await?;

        let mut html = String::new();
        if self.has_file_field {
            html.push_str(render::FILE_SUPPORT_SCRIPT);
        }
        html.push_str("</form>");
        Ok(html)
    }

    fn render_input(
        &mut self,
        input_type: Option<&str>,
        name: &str,
        default: Option<&str>,
        attrs: &[(&str, &str)],
        rule: Option<&str>,
    ) -> String {
        self.register_rule(name, rule);

        let mut list = Vec::new();
        if let Some(ty) = input_type {
            list.push(("type".to_string(), ty.to_string()));
        }
        for &(n, v) in attrs {
            upsert(&mut list, n, v);
        }
        upsert(&mut list, "name", name);
        let value = self.field_value(name, default);
        upsert(&mut list, "value", &value);
        self.apply_error_class(name, &mut list);

        let mut html = render::void_element("input", &list);
        html.push_str(&self.inline_error(name));
        html
    }

    fn field_value(&self, name: &str, default: Option<&str>) -> String {
        self.state
            .value(name)
            .or(default)
            .unwrap_or_default()
            .to_string()
    }

    fn register_rule(&mut self, name: &str, rule: Option<&str>) {
        if let Some(rule) = rule {
            self.state.rules.insert(name.to_string(), rule.to_string());
        }
    }

    fn apply_error_class(&self, name: &str, attrs: &mut Vec<(String, String)>) {
        if self.error_bag.first(name).is_none() {
            return;
        }
        if let Some(entry) = attrs.iter_mut().find(|(n, _)| n == "class") {
            entry.1 = format!("{} {}", entry.1, self.error_class);
        } else {
            attrs.push(("class".to_string(), self.error_class.clone()));
        }
    }

    fn inline_error(&self, name: &str) -> String {
        self.error_bag.first(name).map_or_else(String::new, |msg| {
            render::element(
                "span",
                &owned(&[("class", self.error_class.as_str())]),
                &render::escape(msg),
            )
        })
    }
}

fn owned(attrs: &[(&str, &str)]) -> Vec<(String, String)> {
    attrs.iter().map(|&(n, v)| (n.to_string(), v.to_string())).collect()
}

fn upsert(attrs: &mut Vec<(String, String)>, name: &str, value: &str) {
    if let Some(entry) = attrs.iter_mut().find(|(n, _)| n == name) {
        entry.1 = value.to_string();
    } else {
        attrs.push((name.to_string(), value.to_string()));
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FormsConfig;
    use crate::state::FormKit;
    use crate::storage::StoredUpload;
    use tempfile::TempDir;

    async fn test_kit() -> (FormKit, TempDir) {
        let temp = TempDir::new().unwrap();
        let config = FormsConfig {
            upload_path: temp.path().join("uploads"),
            ..FormsConfig::default()
        };
        let kit = FormKit::builder(config).build().unwrap();
        (kit, temp)
    }

    #[tokio::test]
    async fn test_open_tag_contains_defaults_and_token() {
        let (kit, _temp) = test_kit().await;
        let form = Form::open(&kit, "/contact", FormAttributes::new(), FormOptions::default())
            .await
            .unwrap();

        let tag = form.open_tag();
        assert!(tag.starts_with("<form method=\"POST\""));
        assert!(tag.contains(&format!("action=\"/forms/{}\"", form.id())));
        assert!(tag.contains("enctype=\"multipart/form-data\""));
        assert!(tag.contains("name=\"_token\""));
    }

    #[tokio::test]
    async fn test_same_url_same_id() {
        let (kit, _temp) = test_kit().await;
        let first = Form::open(&kit, "/contact", FormAttributes::new(), FormOptions::default())
            .await
            .unwrap();
        let second = Form::open(&kit, "/contact", FormAttributes::new(), FormOptions::default())
            .await
            .unwrap();
        assert_eq!(first.id(), second.id());

        let other = Form::open(&kit, "/signup", FormAttributes::new(), FormOptions::default())
            .await
            .unwrap();
        assert_ne!(first.id(), other.id());
    }

    #[tokio::test]
    async fn test_session_value_beats_default() {
        let (kit, _temp) = test_kit().await;

        // Simulate a prior submission
        let id = FormState::form_id(&kit.config().session_prefix, "/contact");
        let mut prior = FormState { id, ..FormState::default() };
        prior.values.insert("name".to_string(), "Ada Lovelace".to_string());
        kit.form_states().save(&prior).await.unwrap();

        let mut form = Form::open(&kit, "/contact", FormAttributes::new(), FormOptions::default())
            .await
            .unwrap();
        let html = form.text("name", Some("Anonymous"), &[], None);
        assert!(html.contains("value=\"Ada Lovelace\""));
        assert!(!html.contains("Anonymous"));
    }

    #[tokio::test]
    async fn test_default_used_without_session_value() {
        let (kit, _temp) = test_kit().await;
        let mut form = Form::open(&kit, "/contact", FormAttributes::new(), FormOptions::default())
            .await
            .unwrap();
        let html = form.text("name", Some("Anonymous"), &[], None);
        assert!(html.contains("value=\"Anonymous\""));
    }

    #[tokio::test]
    async fn test_close_persists_rules_and_file_fields() {
        let (kit, _temp) = test_kit().await;
        let mut form = Form::open(&kit, "/contact", FormAttributes::new(), FormOptions::default())
            .await
            .unwrap();
        let id = form.id().to_string();

        form.text("name", None, &[], Some("required|max:100"));
        form.file("cv", &[], Some("max:2048"));
        let closing = form.close().await.unwrap();
        assert!(closing.contains("</form>"));
        assert!(closing.contains("<script>"));

        let saved = kit.form_states().load(&id).await.unwrap().unwrap();
        assert_eq!(saved.rules["name"], "required|max:100");
        assert_eq!(saved.rules["cv"], "max:2048");
        assert!(saved.is_file_field("cv"));
        assert!(saved.csrf_token.is_some());
    }

    #[tokio::test]
    async fn test_no_script_without_file_field() {
        let (kit, _temp) = test_kit().await;
        let mut form = Form::open(&kit, "/contact", FormAttributes::new(), FormOptions::default())
            .await
            .unwrap();
        form.text("name", None, &[], None);
        let closing = form.close().await.unwrap();
        assert_eq!(closing, "</form>");
    }

    #[tokio::test]
    async fn test_select_marks_session_value_selected() {
        let (kit, _temp) = test_kit().await;

        let id = FormState::form_id(&kit.config().session_prefix, "/contact");
        let mut prior = FormState { id, ..FormState::default() };
        prior.values.insert("topic".to_string(), "billing".to_string());
        kit.form_states().save(&prior).await.unwrap();

        let mut form = Form::open(&kit, "/contact", FormAttributes::new(), FormOptions::default())
            .await
            .unwrap();
        let html = form.select(
            "topic",
            &[("support", "Support"), ("billing", "Billing")],
            Some("support"),
            &[],
            None,
        );
        assert!(html.contains("<option value=\"billing\" selected=\"selected\">Billing</option>"));
        assert!(html.contains("<option value=\"support\">Support</option>"));
    }

    #[tokio::test]
    async fn test_file_field_shows_stored_upload() {
        let (kit, _temp) = test_kit().await;

        let id = FormState::form_id(&kit.config().session_prefix, "/contact");
        let mut prior = FormState { id, ..FormState::default() };
        prior.uploads.insert(
            "cv".to_string(),
            StoredUpload {
                path: "abc/resume.pdf".to_string(),
                name: "resume.pdf".to_string(),
                size: 2048,
            },
        );
        kit.form_states().save(&prior).await.unwrap();

        let mut form = Form::open(&kit, "/contact", FormAttributes::new(), FormOptions::default())
            .await
            .unwrap();
        let html = form.file("cv", &[], None);
        assert!(html.contains("resume.pdf (2 KB)"));
        assert!(html.contains("name=\"delete_cv\""));
    }

    #[tokio::test]
    async fn test_errors_render_and_flag_fields() {
        let (kit, _temp) = test_kit().await;

        let id = FormState::form_id(&kit.config().session_prefix, "/contact");
        let mut prior = FormState { id: id.clone(), ..FormState::default() };
        prior.errors.add("email", "The email field is required.");
        kit.form_states().save(&prior).await.unwrap();

        let mut form = Form::open(&kit, "/contact", FormAttributes::new(), FormOptions::default())
            .await
            .unwrap();
        let summary = form.errors("Please fix the errors below.", "alert");
        assert!(summary.contains("Please fix the errors below."));
        assert!(summary.contains("<li>The email field is required.</li>"));

        let field = form.email("email", None, &[("class", "input")], None);
        assert!(field.contains("class=\"input alert\""));
        assert!(field.contains("<span class=\"alert\">The email field is required.</span>"));

        // The bag is consumed: closing writes a clean slot
        form.close().await.unwrap();
        let saved = kit.form_states().load(&id).await.unwrap().unwrap();
        assert!(saved.errors.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_handler_rejected_at_open() {
        let (kit, _temp) = test_kit().await;
        let result = Form::open(
            &kit,
            "/contact",
            FormAttributes::new(),
            FormOptions::new().handler("webhook"),
        )
        .await;
        assert!(matches!(result, Err(FormKitError::UnknownHandler(name)) if name == "webhook"));
    }

    #[tokio::test]
    async fn test_succeeded_flag_consumed_on_open() {
        let (kit, _temp) = test_kit().await;
        let form = Form::open(&kit, "/contact", FormAttributes::new(), FormOptions::default())
            .await
            .unwrap();
        let id = form.id().to_string();
        assert!(!form.succeeded());

        kit.form_states().mark_sent(&id).await.unwrap();
        let form = Form::open(&kit, "/contact", FormAttributes::new(), FormOptions::default())
            .await
            .unwrap();
        assert!(form.succeeded());

        let form = Form::open(&kit, "/contact", FormAttributes::new(), FormOptions::default())
            .await
            .unwrap();
        assert!(!form.succeeded());
    }

    #[tokio::test]
    async fn test_values_escaped_in_markup() {
        let (kit, _temp) = test_kit().await;
        let mut form = Form::open(&kit, "/contact", FormAttributes::new(), FormOptions::default())
            .await
            .unwrap();
        let html = form.text("name", Some("\"><script>"), &[], None);
        assert!(html.contains("value=\"&quot;&gt;&lt;script&gt;\""));
    }
}
