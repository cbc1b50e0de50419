#[cfg(test)]
mod unit_tests {
    use super::super::*;

    #[test]
    fn test_sanitize_html_removes_scripts() {
        let html = r#"<p>Hello</p><script>alert('XSS')</script><p>World</p>"#;
        let sanitized = sanitize::sanitize_html(html);
        assert!(!sanitized.contains("<script"));
        assert!(!sanitized.contains("alert"));
        assert!(sanitized.contains("Hello"));
        assert!(sanitized.contains("World"));
    }

    #[test]
    fn test_sanitize_preview_keeps_plugin_classes() {
        let html = r#"<span class="math-inline">x^2</span><div class="mermaid">graph TD</div>"#;
        let sanitized = sanitize::sanitize_preview(html, true);
        assert!(sanitized.contains("math-inline"));
        assert!(sanitized.contains("mermaid"));
    }

    #[test]
    fn test_sanitize_preview_keeps_file_links() {
        let html = r#"<img src="file:///res/0123456789abcdef0123456789abcdef">"#;
        let sanitized = sanitize::sanitize_preview(html, false);
        assert!(sanitized.contains("file:///res/"));
    }

    #[test]
    fn test_preview_keeps_resolved_resource_image() {
        let rendered = markdown::render("![cat](file:///res/0123456789abcdef0123456789abcdef)", true);
        let sanitized = sanitize::sanitize_preview(&rendered.html, true);
        assert!(sanitized.contains(r#"src="file:///res/0123456789abcdef0123456789abcdef""#));
    }

    #[test]
    fn test_preview_drops_script_links_after_render() {
        let rendered = markdown::render("[x](javascript:alert(1)) <script>alert(2)</script>", true);
        let sanitized = sanitize::sanitize_preview(&rendered.html, true);
        assert!(!sanitized.contains("javascript:"));
        assert!(!sanitized.contains("<script"));
    }

    #[test]
    fn test_preview_keeps_math_source() {
        let rendered = markdown::render("Area: $a+b$", true);
        let sanitized = sanitize::sanitize_preview(&rendered.html, true);
        assert!(sanitized.contains(r#"data-math="a+b""#));
        assert!(sanitized.contains("$a+b$"));
    }

    #[test]
    fn test_sanitize_removes_dangerous_attributes() {
        let html = r#"<a href="javascript:alert('XSS')">Click me</a>"#;
        let sanitized = sanitize::sanitize_preview(html, true);
        assert!(!sanitized.contains("javascript:"));
    }

    #[test]
    fn test_markdown_table_rendering() {
        let markdown = r#"
| Header 1 | Header 2 |
|----------|----------|
| Cell 1   | Cell 2   |
"#;
        let html = markdown::to_html(markdown);
        assert!(html.contains("<table>"));
        assert!(html.contains("<th>"));
        assert!(html.contains("<td>"));
    }

    #[test]
    fn test_math_block() {
        let md = "$$\n\\int_0^1 x^2 dx = \\frac{1}{3}\n$$";
        let html = markdown::to_html(md);
        assert!(html.contains(r#"class="math-block""#));
    }

    #[test]
    fn test_patch_mermaid_blocks() {
        let html = r#"<pre><code class="language-mermaid">graph TD</code></pre>"#;
        let patched = markdown::patch_mermaid_blocks(html);
        assert!(patched.contains(r#"class="mermaid""#));
        assert!(!patched.contains("<pre>"));
        assert!(!patched.contains("<code"));
    }

    #[test]
    fn test_markdown_security_escape() {
        let markdown = "<script>alert('XSS')</script>";
        let html = markdown::to_html(markdown);
        let sanitized = sanitize::sanitize_html(&html);
        assert!(!sanitized.contains("<script>"));
    }

    #[test]
    fn test_split_style_header() {
        let body = "<style>body { color: red; }</style>\n<p>clipped</p>";
        let split = split_style_header(body);
        assert_eq!(split.css, "body { color: red; }");
        assert_eq!(split.html, "<p>clipped</p>");
        assert_eq!(join_style_header(&split.css, &split.html), body);
    }

    #[test]
    fn test_split_without_header() {
        let split = split_style_header("<p>plain</p>");
        assert!(split.css.is_empty());
        assert_eq!(split.html, "<p>plain</p>");
        assert_eq!(join_style_header("", "<p>plain</p>"), "<p>plain</p>");
    }

    #[test]
    fn test_style_must_lead_the_body() {
        let body = "<p>x</p><style>p {}</style>";
        assert_eq!(split_style_header(body).html, body);
    }

    #[test]
    fn test_markup_kind_serialization() {
        let json = serde_json::to_string(&MarkupKind::RichText).unwrap();
        assert_eq!(json, "\"RichText\"");
        assert_eq!(MarkupKind::default(), MarkupKind::Markdown);
        assert!(MarkupKind::RichText.has_style_header());
        assert!(!MarkupKind::Markdown.has_style_header());
    }
}
