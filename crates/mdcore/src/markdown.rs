use comrak::{markdown_to_html, ComrakOptions};
use lazy_static::lazy_static;
use regex::{Captures, Regex};

lazy_static! {
    // Block math is tried first at each position so `$$` pairs are not eaten
    // as two inline spans. Inline math must not start or end with whitespace,
    // which keeps prices like "$5 and $6" as plain text.
    static ref MATH: Regex =
        Regex::new(r"\$\$([^\$]+)\$\$|\$([^\s\$](?:[^\$\n]*[^\s\$])?)\$")
            .expect("Invalid MATH regex pattern");
    static ref MERMAID_BLOCK: Regex =
        Regex::new(r#"<pre><code class="language-mermaid">([^<]*)</code></pre>"#)
            .expect("Invalid MERMAID_BLOCK regex pattern");
}

/// HTML produced from a markdown body, with the client-side plugins it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub html: String,
    pub uses_math: bool,
    pub uses_mermaid: bool,
}

/// Standalone HTML. Link targets comrak considers dangerous (`javascript:`,
/// `file:` and friends) are dropped.
pub fn to_html(src: &str) -> String {
    let opt = create_comrak_options(false);
    let html = markdown_to_html(src, &opt);
    patch_mermaid_blocks(&patch_math_blocks(&html))
}

/// Render GFM markdown for a preview. Math patching is skipped when `math`
/// is false.
///
/// Link targets are kept verbatim so resolved `file:` resource URLs survive;
/// the output must go through [`crate::sanitize::sanitize_preview`].
pub fn render(src: &str, math: bool) -> Rendered {
    let opt = create_comrak_options(true);
    let mut html = markdown_to_html(src, &opt);

    let mut uses_math = false;
    if math {
        let patched = patch_math_blocks(&html);
        uses_math = patched != html;
        html = patched;
    }

    let patched = patch_mermaid_blocks(&html);
    let uses_mermaid = patched != html;

    Rendered {
        html: patched,
        uses_math,
        uses_mermaid,
    }
}

fn create_comrak_options(keep_link_targets: bool) -> ComrakOptions<'static> {
    let mut opt = ComrakOptions::default();

    opt.extension.strikethrough = true;
    opt.extension.table = true;
    opt.extension.autolink = true;
    opt.extension.tasklist = true;
    opt.extension.superscript = true;
    opt.extension.footnotes = true;
    opt.extension.description_lists = true;

    opt.parse.smart = true;

    // `unsafe_` also turns off comrak's URL scrubbing. Raw HTML stays
    // escaped either way because `escape` wins over `unsafe_`.
    opt.render.unsafe_ = keep_link_targets;
    opt.render.escape = true;

    opt
}

/// Wrap `$$...$$` and `$...$` in KaTeX hooks, keeping the delimiters and the
/// source in `data-math`.
pub fn patch_math_blocks(html: &str) -> String {
    MATH.replace_all(html, |caps: &Captures| match caps.get(1) {
        Some(block) => format!(
            r#"<div class="math-block" data-math="{0}">$${0}$$</div>"#,
            block.as_str()
        ),
        None => format!(
            r#"<span class="math-inline" data-math="{0}">${0}$</span>"#,
            &caps[2]
        ),
    })
    .into_owned()
}

pub fn patch_mermaid_blocks(html: &str) -> String {
    MERMAID_BLOCK
        .replace_all(html, r#"<div class="mermaid">${1}</div>"#)
        .into_owned()
}
