use ammonia::Builder;

/// Clean HTML with ammonia's defaults: no scripts, no event handlers.
pub fn sanitize_html(html: &str) -> String {
    Builder::new().clean(html).to_string()
}

/// Clean preview HTML. Resolved resource links use the `file` scheme and
/// must survive, as must the math/mermaid hooks when `allow_math_classes`.
pub fn sanitize_preview(html: &str, allow_math_classes: bool) -> String {
    let mut builder = Builder::new();
    builder.add_url_schemes(&["file"]);

    if allow_math_classes {
        builder
            .add_allowed_classes("span", &["math-inline"])
            .add_allowed_classes("div", &["math-block", "mermaid"])
            .add_tag_attributes("span", &["data-math"])
            .add_tag_attributes("div", &["data-math"]);
    } else {
        builder.add_allowed_classes("div", &["mermaid"]);
    }

    builder.clean(html).to_string()
}
