//! The conversion boundary between editor content, stored bodies and
//! rendered previews.

use anyhow::Result;
use async_trait::async_trait;
use mdcore::{markdown, sanitize, MarkupKind, ResourceLinks};

use crate::config::{RenderConfig, SessionConfig};
use crate::editor::EditorContent;

/// Theme settings passed at render time.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub theme: String,
    pub code_theme_css: Option<String>,
    pub allow_math: bool,
}

impl From<&RenderConfig> for RenderOptions {
    fn from(config: &RenderConfig) -> Self {
        Self {
            theme: config.theme.clone(),
            code_theme_css: config.code_theme_css.clone(),
            allow_math: config.allow_math,
        }
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::from(&RenderConfig::default())
    }
}

/// Side-channel output a preview needs besides its HTML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderResource {
    Stylesheet { name: String, css: String },
    /// A client-side plugin such as `katex` or `mermaid`.
    Plugin(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderOutput {
    pub html: String,
    pub resources: Vec<RenderResource>,
}

#[async_trait]
pub trait Converter: Send + Sync {
    async fn to_storage_form(&self, kind: MarkupKind, content: &EditorContent) -> Result<String>;

    async fn to_editor_form(&self, kind: MarkupKind, body: &str) -> Result<EditorContent>;

    async fn render(
        &self,
        kind: MarkupKind,
        body: &str,
        options: &RenderOptions,
    ) -> Result<RenderOutput>;

    /// Internal resource links to absolute URLs.
    fn resolve_resource_links(&self, body: &str) -> String;

    /// Absolute resource URLs back to internal links.
    fn unresolve_resource_links(&self, body: &str) -> String;

    /// Split a stored body into its preserved header and the editable rest.
    fn split_preserved_prefix(&self, kind: MarkupKind, body: &str) -> (String, String) {
        if kind.has_style_header() {
            let split = mdcore::split_style_header(body);
            (split.css, split.html)
        } else {
            (String::new(), body.to_string())
        }
    }

    fn attach_preserved_prefix(&self, kind: MarkupKind, prefix: &str, body: &str) -> String {
        if kind.has_style_header() {
            mdcore::join_style_header(prefix, body)
        } else {
            body.to_string()
        }
    }
}

/// Converter for editors that work on the markup source itself: markdown
/// notes are edited as markdown and rich-text notes as HTML.
pub struct MarkupConverter {
    links: ResourceLinks,
}

impl MarkupConverter {
    pub fn new(links: ResourceLinks) -> Self {
        Self { links }
    }

    pub fn from_config(config: &SessionConfig) -> Result<Self> {
        let links = ResourceLinks::for_directory(&config.resource_dir()?)?;
        Ok(Self::new(links))
    }

    pub fn links(&self) -> &ResourceLinks {
        &self.links
    }
}

fn theme_class(theme: &str) -> String {
    let name: String = theme
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();
    format!("theme-{}", name)
}

#[async_trait]
impl Converter for MarkupConverter {
    async fn to_storage_form(&self, _kind: MarkupKind, content: &EditorContent) -> Result<String> {
        Ok(content.as_str().replace("\r\n", "\n"))
    }

    async fn to_editor_form(&self, _kind: MarkupKind, body: &str) -> Result<EditorContent> {
        Ok(EditorContent::from(body))
    }

    async fn render(
        &self,
        kind: MarkupKind,
        body: &str,
        options: &RenderOptions,
    ) -> Result<RenderOutput> {
        let mut resources = Vec::new();
        if let Some(css) = &options.code_theme_css {
            resources.push(RenderResource::Stylesheet {
                name: "code-theme".to_string(),
                css: css.clone(),
            });
        }

        let html = match kind {
            MarkupKind::Markdown => {
                let rendered = markdown::render(body, options.allow_math);
                if rendered.uses_math {
                    resources.push(RenderResource::Plugin("katex".to_string()));
                }
                if rendered.uses_mermaid {
                    resources.push(RenderResource::Plugin("mermaid".to_string()));
                }
                sanitize::sanitize_preview(&rendered.html, options.allow_math)
            }
            MarkupKind::RichText => {
                let (css, html) = self.split_preserved_prefix(kind, body);
                if !css.is_empty() {
                    resources.push(RenderResource::Stylesheet {
                        name: "note-style".to_string(),
                        css,
                    });
                }
                sanitize::sanitize_preview(&html, false)
            }
        };

        Ok(RenderOutput {
            html: format!(
                "<div id=\"rendered-md\" class=\"{}\">{}</div>",
                theme_class(&options.theme),
                html
            ),
            resources,
        })
    }

    fn resolve_resource_links(&self, body: &str) -> String {
        self.links.resolve(body)
    }

    fn unresolve_resource_links(&self, body: &str) -> String {
        self.links.unresolve(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "0123456789abcdef0123456789abcdef";

    fn converter() -> MarkupConverter {
        MarkupConverter::new(ResourceLinks::new("file:///res/").unwrap())
    }

    /// Load path followed by save path, as the session runs them.
    async fn round_trip(converter: &MarkupConverter, kind: MarkupKind, body: &str) -> String {
        let (prefix, editable) = converter.split_preserved_prefix(kind, body);
        let resolved = converter.resolve_resource_links(&editable);
        let content = converter.to_editor_form(kind, &resolved).await.unwrap();

        let stored = converter.to_storage_form(kind, &content).await.unwrap();
        let stored = converter.unresolve_resource_links(&stored);
        converter.attach_preserved_prefix(kind, &prefix, &stored)
    }

    #[tokio::test]
    async fn test_round_trip_plain_text() {
        let converter = converter();
        let body = "# Groceries\n\n- milk\n- eggs\n";
        assert_eq!(round_trip(&converter, MarkupKind::Markdown, body).await, body);
    }

    #[tokio::test]
    async fn test_round_trip_resource_link() {
        let converter = converter();
        let body = format!("Photo: ![cat](:/{})", ID);

        let editor_form = converter
            .to_editor_form(MarkupKind::Markdown, &converter.resolve_resource_links(&body))
            .await
            .unwrap();
        assert!(editor_form.as_str().contains("file:///res/"));
        assert_eq!(round_trip(&converter, MarkupKind::Markdown, &body).await, body);
    }

    #[tokio::test]
    async fn test_round_trip_preserved_prefix() {
        let converter = converter();
        let body = "<style>h1 { color: teal; }</style>\n<h1>Clipped</h1>";

        let (prefix, editable) = converter.split_preserved_prefix(MarkupKind::RichText, body);
        assert_eq!(prefix, "h1 { color: teal; }");
        assert_eq!(editable, "<h1>Clipped</h1>");
        assert_eq!(round_trip(&converter, MarkupKind::RichText, body).await, body);
    }

    #[tokio::test]
    async fn test_markdown_never_splits_prefix() {
        let converter = converter();
        let body = "<style>x</style>\ntext";
        let (prefix, editable) = converter.split_preserved_prefix(MarkupKind::Markdown, body);
        assert!(prefix.is_empty());
        assert_eq!(editable, body);
    }

    #[tokio::test]
    async fn test_storage_form_normalizes_line_endings() {
        let stored = converter()
            .to_storage_form(MarkupKind::Markdown, &EditorContent::from("a\r\nb"))
            .await
            .unwrap();
        assert_eq!(stored, "a\nb");
    }

    #[tokio::test]
    async fn test_render_markdown_reports_plugins() {
        let options = RenderOptions {
            theme: "dark".to_string(),
            code_theme_css: Some("pre { }".to_string()),
            allow_math: true,
        };
        let output = converter()
            .render(
                MarkupKind::Markdown,
                "Euler: $e^{i\\pi} = -1$\n\n```mermaid\ngraph LR\n  A --> B\n```",
                &options,
            )
            .await
            .unwrap();

        assert!(output.html.contains("theme-dark"));
        assert!(output.resources.contains(&RenderResource::Plugin("katex".to_string())));
        assert!(output.resources.contains(&RenderResource::Plugin("mermaid".to_string())));
        assert!(output.resources.contains(&RenderResource::Stylesheet {
            name: "code-theme".to_string(),
            css: "pre { }".to_string(),
        }));
    }

    #[tokio::test]
    async fn test_render_keeps_resolved_resource_images() {
        let converter = converter();
        let body = converter.resolve_resource_links(&format!("![view](:/{})", ID));
        let output = converter
            .render(MarkupKind::Markdown, &body, &RenderOptions::default())
            .await
            .unwrap();

        assert!(output
            .html
            .contains(&format!("src=\"file:///res/{}\"", ID)));
    }

    #[tokio::test]
    async fn test_render_rich_text_moves_style_to_resources() {
        let output = converter()
            .render(
                MarkupKind::RichText,
                "<style>p { margin: 0; }</style>\n<p>hi</p><script>alert(1)</script>",
                &RenderOptions::default(),
            )
            .await
            .unwrap();

        assert!(output.html.contains("<p>hi</p>"));
        assert!(!output.html.contains("<script"));
        assert!(!output.html.contains("<style"));
        assert_eq!(
            output.resources,
            vec![RenderResource::Stylesheet {
                name: "note-style".to_string(),
                css: "p { margin: 0; }".to_string(),
            }]
        );
    }

    #[test]
    fn test_theme_class_is_sanitized() {
        assert_eq!(theme_class("dark\" onload=\"x"), "theme-darkonloadx");
    }
}
