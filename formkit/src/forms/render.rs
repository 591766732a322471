//! HTML emission helpers
//!
//! Plain string building; attributes with empty values are skipped.

/// Escape text for use inside an attribute value or element body
pub(crate) fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render an attribute list, skipping entries with empty values
pub(crate) fn attr_string(attrs: &[(String, String)]) -> String {
    let mut out = String::new();
    for (name, value) in attrs {
        if value.is_empty() {
            continue;
        }
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&escape(value));
        out.push('"');
    }
    out
}

/// Render a void element such as `<input>`
pub(crate) fn void_element(tag: &str, attrs: &[(String, String)]) -> String {
    format!("<{tag}{}>", attr_string(attrs))
}

/// Render a container element with pre-escaped body HTML
pub(crate) fn element(tag: &str, attrs: &[(String, String)], body_html: &str) -> String {
    format!("<{tag}{}>{body_html}</{tag}>", attr_string(attrs))
}

/// Human-readable size for the stored-upload note next to file inputs
pub(crate) fn human_size(bytes: u64) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{} KB", bytes / 1024)
    } else {
        format!("{bytes} B")
    }
}

/// Support script appended before `</form>` when a file field was rendered
///
/// Checking the delete box disables the file input; choosing a replacement
/// file clears the delete box again.
pub(crate) const FILE_SUPPORT_SCRIPT: &str = concat!(
    "<script>",
    "document.querySelectorAll(\"form .form-upload\").forEach(function (note) {",
    "var form = note.closest(\"form\");",
    "var input = form.querySelector('input[type=file][name=\"' + note.dataset.field + '\"]');",
    "var del = note.querySelector('input[type=checkbox]');",
    "if (!input || !del) return;",
    "del.addEventListener(\"change\", function () { input.disabled = del.checked; });",
    "input.addEventListener(\"change\", function () {",
    "if (input.files.length) { del.checked = false; input.disabled = false; }",
    "});",
    "});",
    "</script>"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(escape("a & b"), "a &amp; b");
        assert_eq!(escape("<script>"), "&lt;script&gt;");
        assert_eq!(escape("\"quoted\""), "&quot;quoted&quot;");
        assert_eq!(escape("it's"), "it&#39;s");
    }

    #[test]
    fn test_attr_string_skips_empty_values() {
        let attrs = vec![
            ("type".to_string(), "text".to_string()),
            ("value".to_string(), String::new()),
            ("name".to_string(), "email".to_string()),
        ];
        assert_eq!(attr_string(&attrs), " type=\"text\" name=\"email\"");
    }

    #[test]
    fn test_void_element() {
        let attrs = vec![("type".to_string(), "submit".to_string())];
        assert_eq!(void_element("input", &attrs), "<input type=\"submit\">");
    }

    #[test]
    fn test_element() {
        let attrs = vec![("name".to_string(), "message".to_string())];
        assert_eq!(
            element("textarea", &attrs, "hello"),
            "<textarea name=\"message\">hello</textarea>"
        );
    }

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(2048), "2 KB");
        assert_eq!(human_size(3 * 1024 * 1024), "3.0 MB");
    }
}
