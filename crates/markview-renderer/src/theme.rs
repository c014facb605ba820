//! Injected visual theme.
//!
//! The renderer does not define theme values (that is the host's job); it
//! only folds the injected values into the note stylesheet and uses the
//! theme's `cache_key` to scope memoized assets.

use serde::{Deserialize, Serialize};

/// Visual theme values injected by the host application.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    /// Opaque key identifying this theme for memoization. Two themes with
    /// different values must have different cache keys.
    pub cache_key: String,
    /// Page background color.
    pub background_color: String,
    /// Main text color.
    pub color: String,
    /// De-emphasized text color (status placeholders, icons).
    pub color_faded: String,
    /// Link color.
    pub link_color: String,
    /// Base font family.
    pub font_family: String,
    /// Base font size in pixels.
    pub font_size: u32,
    /// Background color for code blocks.
    pub code_background_color: String,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            cache_key: "default".to_owned(),
            background_color: "#ffffff".to_owned(),
            color: "#32373f".to_owned(),
            color_faded: "#7c8b9e".to_owned(),
            link_color: "#155bda".to_owned(),
            font_family: "Avenir, Arial, sans-serif".to_owned(),
            font_size: 15,
            code_background_color: "rgb(243, 243, 243)".to_owned(),
        }
    }
}

/// Build the base note stylesheet from theme values.
///
/// Returned as a list of CSS strings so callers can interleave rule assets
/// before folding everything into a single `<style>` block.
pub fn note_style(theme: &Theme, content_max_width: u32) -> Vec<String> {
    let max_width_css = if content_max_width > 0 {
        format!("max-width: {content_max_width}px; margin: 0 auto;")
    } else {
        String::new()
    };

    let css = format!(
        "\
#rendered-md {{
\tbackground-color: {background};
\tcolor: {color};
\tfont-family: {font_family};
\tfont-size: {font_size}px;
\t{max_width_css}
}}
a {{ color: {link_color}; }}
pre.hljs, code {{ background-color: {code_background}; }}
.resource-icon {{ display: inline-block; background-color: {color_faded}; }}
.not-loaded-resource img {{ width: 1.15em; height: 1.15em; }}
a.not-loaded-resource {{ opacity: 0.5; }}
.inline-code {{ border: 1px dotted {color_faded}; background-color: {code_background}; padding: .2em; }}
.checkbox-label-checked {{ opacity: 0.5; text-decoration: line-through; }}
.md-checkbox input {{ margin-right: 0.5em; }}
",
        background = theme.background_color,
        color = theme.color,
        font_family = theme.font_family,
        font_size = theme.font_size,
        link_color = theme.link_color,
        code_background = theme.code_background_color,
        color_faded = theme.color_faded,
    );

    vec![css]
}
