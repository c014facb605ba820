//! Diagram rendering for `mermaid` fenced blocks.
//!
//! The diagram source is wrapped for client-side rendering by the
//! shipped mermaid assets, next to a hidden copy of the fence so an
//! embedding editor can reconstruct the markup. An unusable block is
//! shown as an error box instead of aborting the render. The engine
//! script only ships when a document actually contains a diagram.

use crate::assets::PluginAsset;
use crate::html::escape_html;
use crate::options::RenderOptions;
use crate::rules::{RenderContext, RenderRule, RuleEvent, RuleOutcome};
use crate::theme::Theme;

pub struct MermaidRule;

fn validate(source: &str) -> Result<(), &'static str> {
    if source.trim().is_empty() {
        return Err("empty diagram");
    }
    Ok(())
}

fn render(source: &str) -> String {
    let escaped = escape_html(source.strip_suffix('\n').unwrap_or(source));
    match validate(source) {
        Ok(()) => format!(
            "<div class=\"joplin-editable\"><pre class=\"joplin-source\" data-joplin-language=\"mermaid\" data-joplin-source-open=\"```mermaid&#10;\" data-joplin-source-close=\"&#10;```\">{escaped}</pre><div class=\"mermaid\">{escaped}</div></div>"
        ),
        Err(reason) => format!("<div class=\"mermaid-error\" title=\"{reason}\">{escaped}</div>"),
    }
}

impl RenderRule for MermaidRule {
    fn name(&self) -> &'static str {
        "mermaid"
    }

    fn assets(&self, _theme: &Theme, _options: &RenderOptions) -> Vec<PluginAsset> {
        vec![
            PluginAsset::file("mermaid.min.js"),
            PluginAsset::file("mermaid_render.js"),
        ]
    }

    fn assets_on_use_only(&self) -> bool {
        true
    }

    fn handle(&self, event: &RuleEvent<'_>, _ctx: &mut RenderContext<'_>) -> RuleOutcome {
        let RuleEvent::CodeBlock { language, content } = event else {
            return RuleOutcome::PassThrough;
        };
        if *language != "mermaid" {
            return RuleOutcome::PassThrough;
        }
        RuleOutcome::Html(render(content))
    }
}
