//! Conversion between internal resource links (`:/<id>`) and the absolute
//! URLs an editor or preview can actually load.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::path::Path;

lazy_static! {
    static ref INTERNAL_LINK: Regex =
        Regex::new(r":/([0-9a-fA-F]{32})").expect("Invalid INTERNAL_LINK regex pattern");
}

/// Length of a resource id in hex characters.
pub const RESOURCE_ID_LEN: usize = 32;

#[derive(Debug, Clone)]
pub struct ResourceLinks {
    base_url: String,
    external_link: Regex,
}

impl ResourceLinks {
    pub fn new(base_url: impl Into<String>) -> Result<Self, regex::Error> {
        let base_url = base_url.into();
        let external_link = Regex::new(&format!(
            "{}([0-9a-fA-F]{{{}}})",
            regex::escape(&base_url),
            RESOURCE_ID_LEN
        ))?;
        Ok(Self {
            base_url,
            external_link,
        })
    }

    /// Links pointing at files inside `dir`.
    pub fn for_directory(dir: &Path) -> Result<Self, regex::Error> {
        let dir = dir.to_string_lossy();
        Self::new(format!("file://{}/", dir.trim_end_matches('/')))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Internal to absolute, for display.
    pub fn resolve(&self, body: &str) -> String {
        INTERNAL_LINK
            .replace_all(body, |caps: &Captures| format!("{}{}", self.base_url, &caps[1]))
            .into_owned()
    }

    /// Absolute back to internal, for storage.
    pub fn unresolve(&self, body: &str) -> String {
        self.external_link
            .replace_all(body, |caps: &Captures| format!(":/{}", &caps[1]))
            .into_owned()
    }
}

/// Markdown reference to a stored resource.
pub fn markdown_tag(id: &str, title: &str, is_image: bool) -> String {
    let title = title.replace(['[', ']'], "");
    if is_image {
        format!("![{}](:/{})", title, id)
    } else {
        format!("[{}](:/{})", title, id)
    }
}
