//! Math expression rendering.
//!
//! Expressions are validated and wrapped for client-side typesetting by
//! the shipped katex assets. An invalid expression never aborts the
//! render; it is shown as an inline error box carrying the escaped
//! source. The heavy font and script assets only ship when a document
//! actually contains math.

use crate::assets::PluginAsset;
use crate::html::escape_html;
use crate::options::RenderOptions;
use crate::rules::{RenderContext, RenderRule, RuleEvent, RuleOutcome};
use crate::theme::Theme;

pub struct MathRule;

/// Reject expressions the typesetter is guaranteed to choke on, so the
/// error is visible in place instead of failing in the client script.
fn validate(expression: &str) -> Result<(), &'static str> {
    if expression.trim().is_empty() {
        return Err("empty expression");
    }
    let mut depth = 0i32;
    let mut chars = expression.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if chars.next().is_none() {
                    return Err("trailing backslash");
                }
            }
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth < 0 {
                    return Err("unbalanced braces");
                }
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err("unbalanced braces");
    }
    Ok(())
}

fn render(expression: &str, display: bool) -> String {
    match validate(expression) {
        Ok(()) => {
            let escaped = escape_html(expression);
            if display {
                format!("<div class=\"joplin-katex katex-display\">{escaped}</div>")
            } else {
                format!("<span class=\"joplin-katex katex-inline\">{escaped}</span>")
            }
        }
        Err(reason) => format!(
            "<span class=\"katex-error\" title=\"{reason}\">{}</span>",
            escape_html(expression)
        ),
    }
}

impl RenderRule for MathRule {
    fn name(&self) -> &'static str {
        "katex"
    }

    fn assets(&self, _theme: &Theme, _options: &RenderOptions) -> Vec<PluginAsset> {
        vec![
            PluginAsset::file("katex.css"),
            PluginAsset::file("katex.js"),
            PluginAsset::file("fonts/KaTeX_Main-Regular.woff2"),
            PluginAsset::file("fonts/KaTeX_Math-Italic.woff2"),
            PluginAsset::file("fonts/KaTeX_Size1-Regular.woff2"),
        ]
    }

    fn assets_on_use_only(&self) -> bool {
        true
    }

    fn handle(&self, event: &RuleEvent<'_>, _ctx: &mut RenderContext<'_>) -> RuleOutcome {
        match event {
            RuleEvent::InlineMath(expression) => RuleOutcome::Html(render(expression, false)),
            RuleEvent::DisplayMath(expression) => RuleOutcome::Html(render(expression, true)),
            _ => RuleOutcome::PassThrough,
        }
    }
}
