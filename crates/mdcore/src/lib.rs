pub mod markdown;
pub mod resources;
pub mod sanitize;
pub mod style;

use serde::{Deserialize, Serialize};

pub use markdown::{to_html, Rendered};
pub use resources::ResourceLinks;
pub use style::{join_style_header, split_style_header, StyleSplit};

/// Storage markup of a note body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MarkupKind {
    #[default]
    Markdown,
    /// HTML body, possibly led by a preserved `<style>` block.
    RichText,
}

impl MarkupKind {
    /// Whether bodies of this kind may carry a non-editable style header.
    pub fn has_style_header(self) -> bool {
        matches!(self, MarkupKind::RichText)
    }
}

#[cfg(test)]
mod tests;
