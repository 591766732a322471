//! Rule-string validation
//!
//! Field builders record rules as Laravel-style pipe-separated strings
//! (`"required|email|max:255"`).
//! The strings are parsed into [`Rule`] values and evaluated against the
//! submitted values and stored uploads when the submission arrives.
//!
//! Unknown rule names are skipped with a warning rather than failing the
//! submission; address checks delegate to the `validator` crate.

use crate::forms::{FormState, ValidationErrors};
use crate::storage::StoredUpload;
use validator::{ValidateEmail, ValidateUrl};

/// A single parsed validation rule
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    /// Value must be present and non-empty (for file fields: upload present)
    Required,
    /// Value must be a valid email address
    Email,
    /// Value must be a valid URL
    Url,
    /// Value must parse as a number
    Numeric,
    /// Value must parse as an integer
    Integer,
    /// Value must be a `YYYY-MM-DD` date
    Date,
    /// Value must be a truthy checkbox value (`1`, `true`, `on`, `yes`)
    Accepted,
    /// Minimum: numeric value, string length, or upload size in KiB
    Min(f64),
    /// Maximum: numeric value, string length, or upload size in KiB
    Max(f64),
    /// Value must be one of the listed options
    In(Vec<String>),
}

/// Parse a pipe-separated rule string
///
/// # Examples
///
/// ```rust
/// use formkit::validate::{parse, Rule};
///
/// let rules = parse("required|email|max:255");
/// assert_eq!(rules[0], Rule::Required);
/// assert_eq!(rules[1], Rule::Email);
/// assert_eq!(rules[2], Rule::Max(255.0));
/// ```
#[must_use]
pub fn parse(rule: &str) -> Vec<Rule> {
    let mut rules = Vec::new();
    for segment in rule.split('|') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        let (name, arg) = match segment.split_once(':') {
            Some((name, arg)) => (name, Some(arg)),
            None => (segment, None),
        };
        let parsed = match (name, arg) {
            ("required", _) => Some(Rule::Required),
            ("email", _) => Some(Rule::Email),
            ("url", _) => Some(Rule::Url),
            ("numeric", _) => Some(Rule::Numeric),
            ("integer", _) => Some(Rule::Integer),
            ("date", _) => Some(Rule::Date),
            ("accepted", _) => Some(Rule::Accepted),
            ("min", Some(arg)) => arg.parse().ok().map(Rule::Min),
            ("max", Some(arg)) => arg.parse().ok().map(Rule::Max),
            ("in", Some(arg)) => Some(Rule::In(
                arg.split(',').map(|s| s.trim().to_string()).collect(),
            )),
            _ => None,
        };
        match parsed {
            Some(rule) => rules.push(rule),
            None => tracing::warn!(rule = segment, "skipping unsupported validation rule"),
        }
    }
    rules
}

/// Whether a checkbox-style value counts as set
#[must_use]
pub fn is_truthy(value: &str) -> bool {
    matches!(value, "1" | "true" | "on" | "yes")
}

/// Validate every recorded rule of `form`, returning the collected errors
///
/// Rules on file fields are checked against the stored uploads, everything
/// else against the submitted values. Call
/// [`prune_file_rules`] first to apply the
/// drop-rule-without-file behaviour of the submission pipeline.
#[must_use]
pub fn run(form: &FormState) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    for (field, rule) in &form.rules {
        let rules = parse(rule);
        let messages = if form.is_file_field(field) {
            check_upload(field, &rules, form.uploads.get(field))
        } else {
            check_value(field, &rules, form.value(field))
        };
        for message in messages {
            errors.add(field.clone(), message);
        }
    }
    errors
}

/// Drop the rules of file fields that hold no stored upload
///
/// A file field with neither a fresh nor a kept upload has nothing left to
/// validate; checking the delete box therefore also drops the field's
/// requirement.
pub fn prune_file_rules(form: &mut FormState) {
    let file_fields = form.file_fields.clone();
    for field in file_fields {
        if !form.uploads.contains_key(&field) {
            form.rules.remove(&field);
        }
    }
}

/// Check a text field's value against its rules
#[must_use]
pub fn check_value(field: &str, rules: &[Rule], value: Option<&str>) -> Vec<String> {
    let mut messages = Vec::new();
    let value = value.unwrap_or_default();
    let present = !value.trim().is_empty();

    if !present {
        if rules.contains(&Rule::Required) {
            messages.push(format!("The {field} field is required."));
        }
        // Remaining rules only apply to present values
        return messages;
    }

    let numeric_context = rules
        .iter()
        .any(|r| matches!(r, Rule::Numeric | Rule::Integer));

    for rule in rules {
        match rule {
            Rule::Required => {}
            Rule::Email => {
                if !value.validate_email() {
                    messages.push(format!("The {field} must be a valid email address."));
                }
            }
            Rule::Url => {
                if !value.validate_url() {
                    messages.push(format!("The {field} must be a valid URL."));
                }
            }
            Rule::Numeric => {
                if value.parse::<f64>().is_err() {
                    messages.push(format!("The {field} must be a number."));
                }
            }
            Rule::Integer => {
                if value.parse::<i64>().is_err() {
                    messages.push(format!("The {field} must be an integer."));
                }
            }
            Rule::Date => {
                if chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d").is_err() {
                    messages.push(format!("The {field} is not a valid date."));
                }
            }
            Rule::Accepted => {
                if !is_truthy(value) {
                    messages.push(format!("The {field} must be accepted."));
                }
            }
            Rule::Min(min) => {
                let size = field_size(value, numeric_context);
                if size < *min {
                    messages.push(min_message(field, *min, numeric_context));
                }
            }
            Rule::Max(max) => {
                let size = field_size(value, numeric_context);
                if size > *max {
                    messages.push(max_message(field, *max, numeric_context));
                }
            }
            Rule::In(options) => {
                if !options.iter().any(|opt| opt == value) {
                    messages.push(format!("The selected {field} is invalid."));
                }
            }
        }
    }
    messages
}

/// Check a file field's stored upload against its rules
///
/// `Min`/`Max` bound the upload size in KiB; the content-oriented text rules
/// do not apply to uploads and are ignored.
#[must_use]
pub fn check_upload(field: &str, rules: &[Rule], upload: Option<&StoredUpload>) -> Vec<String> {
    let mut messages = Vec::new();
    let Some(upload) = upload else {
        if rules.contains(&Rule::Required) {
            messages.push(format!("The {field} field is required."));
        }
        return messages;
    };

    let kib = upload.size as f64 / 1024.0;
    for rule in rules {
        match rule {
            Rule::Min(min) => {
                if kib < *min {
                    messages.push(format!("The {field} must be at least {min} kilobytes."));
                }
            }
            Rule::Max(max) => {
                if kib > *max {
                    messages.push(format!("The {field} may not be greater than {max} kilobytes."));
                }
            }
            _ => {}
        }
    }
    messages
}

fn field_size(value: &str, numeric_context: bool) -> f64 {
    if numeric_context {
        value.parse::<f64>().unwrap_or(f64::NAN)
    } else {
        value.chars().count() as f64
    }
}

fn min_message(field: &str, min: f64, numeric_context: bool) -> String {
    if numeric_context {
        format!("The {field} must be at least {min}.")
    } else {
        format!("The {field} must be at least {min} characters.")
    }
}

fn max_message(field: &str, max: f64, numeric_context: bool) -> String {
    if numeric_context {
        format!("The {field} may not be greater than {max}.")
    } else {
        format!("The {field} may not be greater than {max} characters.")
    }
}
