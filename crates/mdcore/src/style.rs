//! The `<style>` header that web-clipped HTML notes carry. Editors never see
//! it, so it is split off on load and glued back on save.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref STYLE_HEADER: Regex = Regex::new(r"(?s)\A<style>(.*?)</style>\n?(.*)\z")
        .expect("Invalid STYLE_HEADER regex pattern");
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StyleSplit {
    pub css: String,
    pub html: String,
}

pub fn split_style_header(body: &str) -> StyleSplit {
    match STYLE_HEADER.captures(body) {
        Some(caps) => StyleSplit {
            css: caps[1].to_string(),
            html: caps[2].to_string(),
        },
        None => StyleSplit {
            css: String::new(),
            html: body.to_string(),
        },
    }
}

pub fn join_style_header(css: &str, html: &str) -> String {
    if css.is_empty() {
        html.to_string()
    } else {
        format!("<style>{}</style>\n{}", css, html)
    }
}
