//! Syntax highlighting for fenced code blocks.

use markview_cache::CacheExt;
use sha2::{Digest, Sha256};
use syntect::html::{ClassStyle, ClassedHTMLGenerator, css_for_theme_with_class_style};
use syntect::highlighting::ThemeSet;
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;
use tracing::warn;

use crate::assets::PluginAsset;
use crate::html::{escape_attr, escape_html};
use crate::options::RenderOptions;
use crate::rules::{RenderContext, RenderRule, RuleEvent, RuleOutcome};
use crate::theme::Theme;

/// Blocks at or above this size never get highlighted.
const MAX_HIGHLIGHT_BYTES: usize = 512_000;
/// Stricter bound when no language was given, since every grammar would
/// have to be tried against the content.
const MAX_UNTYPED_HIGHLIGHT_BYTES: usize = 1_000;

pub struct FenceRule {
    syntaxes: SyntaxSet,
    themes: ThemeSet,
}

impl FenceRule {
    #[must_use]
    pub fn new() -> Self {
        Self {
            syntaxes: SyntaxSet::load_defaults_newlines(),
            themes: ThemeSet::load_defaults(),
        }
    }

    fn highlight(&self, language: &str, content: &str) -> Option<String> {
        let syntax = self.syntaxes.find_syntax_by_token(language)?;
        let mut generator = ClassedHTMLGenerator::new_with_class_style(
            syntax,
            &self.syntaxes,
            ClassStyle::Spaced,
        );
        for line in LinesWithEndings::from(content) {
            if let Err(error) = generator.parse_html_for_line_which_includes_newline(line) {
                warn!(%error, language, "highlighting failed, falling back to plain text");
                return None;
            }
        }
        Some(generator.finalize())
    }

    /// Map a configured code theme name onto one of the bundled
    /// highlighting themes.
    fn theme_for(&self, code_theme: &str) -> &syntect::highlighting::Theme {
        let key = if code_theme.contains("dark") {
            "base16-ocean.dark"
        } else {
            "InspiredGitHub"
        };
        self.themes
            .themes
            .get(key)
            .unwrap_or_else(|| &self.themes.themes["InspiredGitHub"])
    }
}

impl Default for FenceRule {
    fn default() -> Self {
        Self::new()
    }
}

fn cache_key(language: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(language.as_bytes());
    hasher.update([0]);
    hasher.update(content.as_bytes());
    format!("highlight:{}", hex::encode(hasher.finalize()))
}

/// Wrap rendered code with a hidden copy of the original source so an
/// editor embedding the output can reconstruct the markup.
fn editable_block(language: &str, content: &str, code_html: &str) -> String {
    let source = content.strip_suffix('\n').unwrap_or(content);
    let fence_open = if language.is_empty() {
        "```\n".to_owned()
    } else {
        format!("```{language}\n")
    };
    format!(
        "<div class=\"joplin-editable\"><pre class=\"joplin-source\" data-joplin-language=\"{}\" data-joplin-source-open=\"{}\" data-joplin-source-close=\"&#10;```\">{}</pre><pre class=\"hljs\"><code>{code_html}</code></pre></div>",
        escape_attr(language),
        escape_attr(&fence_open).replace('\n', "&#10;"),
        escape_html(source),
    )
}

impl RenderRule for FenceRule {
    fn name(&self) -> &'static str {
        "fence"
    }

    fn assets(&self, _theme: &Theme, options: &RenderOptions) -> Vec<PluginAsset> {
        let css = css_for_theme_with_class_style(
            self.theme_for(&options.code_theme),
            ClassStyle::Spaced,
        )
        .unwrap_or_default();
        vec![PluginAsset::inline("text/css", &css)]
    }

    fn handle(&self, event: &RuleEvent<'_>, ctx: &mut RenderContext<'_>) -> RuleOutcome {
        let RuleEvent::CodeBlock { language, content } = event else {
            return RuleOutcome::PassThrough;
        };

        let too_big = content.len() >= MAX_HIGHLIGHT_BYTES
            || (language.is_empty() && content.len() >= MAX_UNTYPED_HIGHLIGHT_BYTES);

        let code_html = if too_big {
            escape_html(content)
        } else {
            let key = cache_key(language, content);
            match ctx.highlight_cache.get_string(&key) {
                Some(cached) => cached,
                None => {
                    let html = self
                        .highlight(language, content)
                        .unwrap_or_else(|| escape_html(content));
                    ctx.highlight_cache.set_string(&key, &html, None);
                    html
                }
            }
        };

        RuleOutcome::Html(editable_block(language, content, &code_html))
    }
}
