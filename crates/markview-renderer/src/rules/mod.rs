//! Pluggable rendering rules.
//!
//! Rules hook into the markdown token stream at fixed dispatch points
//! ([`RuleEvent`]). For each event the registry asks every enabled rule
//! in registration order; the first one returning [`RuleOutcome::Html`]
//! wins and later rules are not consulted.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use markview_cache::MemoryCache;

use crate::assets::PluginAsset;
use crate::error::RenderError;
use crate::options::RenderOptions;
use crate::resolver::LinkReplacement;
use crate::resource::ResourceModel;
use crate::sanitize::HtmlSanitizer;
use crate::theme::Theme;

mod checkbox;
mod fence;
mod highlight_keywords;
mod image;
mod link;
mod math;
mod mermaid;
mod sanitize_html;

pub use checkbox::CheckboxRule;
pub use fence::FenceRule;
pub use highlight_keywords::HighlightKeywordsRule;
pub use image::ImageRule;
pub use link::{LinkCloseRule, LinkOpenRule};
pub use math::MathRule;
pub use mermaid::MermaidRule;
pub use sanitize_html::SanitizeHtmlRule;

/// A dispatch point in the token stream.
#[derive(Clone, Debug)]
pub enum RuleEvent<'a> {
    /// A fenced or indented code block, with its info-string language.
    CodeBlock { language: &'a str, content: &'a str },
    /// An image with resolved alt text.
    Image {
        src: &'a str,
        alt: &'a str,
        title: Option<&'a str>,
    },
    LinkOpen { href: &'a str, title: Option<&'a str> },
    LinkClose,
    /// A block of raw HTML.
    HtmlBlock(&'a str),
    /// An inline HTML fragment, possibly a lone opening or closing tag.
    InlineHtml(&'a str),
    InlineMath(&'a str),
    DisplayMath(&'a str),
    /// A task list checkbox, with the byte offset of its list item in
    /// the source.
    TaskListMarker { checked: bool, offset: usize },
    /// Plain text, already waiting to be escaped by the caller.
    Text(&'a str),
}

/// What a rule decided about an event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RuleOutcome {
    /// Rendered markup; dispatch stops here.
    Html(String),
    /// Not handled; the next rule (or the default writer) takes over.
    PassThrough,
}

/// Mutable state scoped to a single render call.
///
/// Cleared at the start of every render so nothing leaks across calls.
pub struct RenderContext<'a> {
    pub options: &'a RenderOptions,
    pub theme: &'a Theme,
    /// Shared content cache (sanitizer results and the like).
    pub cache: &'a Arc<MemoryCache>,
    /// Highlight result cache, scoped by the caller's highlight key.
    pub highlight_cache: &'a MemoryCache,
    pub sanitizer: &'a HtmlSanitizer,
    pub resource_model: &'a dyn ResourceModel,
    /// In-flight link replacements between open and close tokens.
    pub link_stack: Vec<LinkReplacement>,
    /// Sequential index of checkboxes seen so far in this render.
    pub checkbox_index: u32,
    /// A checkbox label is open and must be closed at the end of the
    /// current list item.
    pub pending_checkbox_label: bool,
    /// Per (note, resource) media embed counters.
    pub embed_counts: HashMap<String, u32>,
    /// Names of rules that actually produced output in this render.
    pub rules_used: HashSet<String>,
    /// Original source text, for source line lookups.
    pub source: &'a str,
}

impl RenderContext<'_> {
    /// 1-based source line of a byte offset.
    #[must_use]
    pub fn line_of_offset(&self, offset: usize) -> u32 {
        let clamped = offset.min(self.source.len());
        u32::try_from(
            self.source[..clamped]
                .bytes()
                .filter(|b| *b == b'\n')
                .count()
                + 1,
        )
        .unwrap_or(u32::MAX)
    }
}

/// One unit of render logic.
pub trait RenderRule: Send + Sync {
    /// Stable registry key, also the id settings are looked up under.
    fn name(&self) -> &'static str;

    /// Static assets the rule's output depends on.
    fn assets(&self, _theme: &Theme, _options: &RenderOptions) -> Vec<PluginAsset> {
        Vec::new()
    }

    /// Whether assets should only ship when the rule rendered something
    /// in the current document.
    fn assets_on_use_only(&self) -> bool {
        false
    }

    /// Inspect an event and either render it or pass.
    fn handle(&self, event: &RuleEvent<'_>, ctx: &mut RenderContext<'_>) -> RuleOutcome;
}

/// Ordered, add-only collection of rules.
pub struct RuleRegistry {
    rules: Vec<Arc<dyn RenderRule>>,
}

impl RuleRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// The built-in rule set, in dispatch order.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        // Diagram fences must be claimed before the generic fence rule
        // highlights them as code.
        for rule in [
            Arc::new(MermaidRule) as Arc<dyn RenderRule>,
            Arc::new(FenceRule::new()),
            Arc::new(SanitizeHtmlRule),
            Arc::new(ImageRule),
            Arc::new(CheckboxRule),
            Arc::new(LinkOpenRule),
            Arc::new(LinkCloseRule),
            Arc::new(MathRule),
            Arc::new(HighlightKeywordsRule),
        ] {
            // Built-in names are distinct; duplicates cannot occur here.
            let _ = registry.register(rule);
        }
        registry
    }

    /// Add a rule. Fails if a rule with the same name is already
    /// registered.
    pub fn register(&mut self, rule: Arc<dyn RenderRule>) -> Result<(), RenderError> {
        if self.rules.iter().any(|r| r.name() == rule.name()) {
            return Err(RenderError::DuplicateRule(rule.name().to_owned()));
        }
        self.rules.push(rule);
        Ok(())
    }

    /// All registered rule names, for UI toggling.
    #[must_use]
    pub fn plugin_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Offer `event` to every enabled rule in order; first rendered
    /// output wins and marks the rule as used for asset aggregation.
    pub fn dispatch(
        &self,
        event: &RuleEvent<'_>,
        ctx: &mut RenderContext<'_>,
        disabled: &HashSet<String>,
    ) -> RuleOutcome {
        for rule in &self.rules {
            if disabled.contains(rule.name()) {
                continue;
            }
            if let RuleOutcome::Html(html) = rule.handle(event, ctx) {
                ctx.rules_used.insert(rule.name().to_owned());
                return RuleOutcome::Html(html);
            }
        }
        RuleOutcome::PassThrough
    }

    /// Assets declared by rules, paired with the owning rule name.
    ///
    /// With `used_only` the result is restricted to use-gated rules that
    /// rendered something (per `used`); otherwise it covers every rule
    /// whose assets ship unconditionally.
    #[must_use]
    pub fn assets(
        &self,
        theme: &Theme,
        options: &RenderOptions,
        used: &HashSet<String>,
        used_only: bool,
        disabled: &HashSet<String>,
    ) -> Vec<(String, PluginAsset)> {
        let mut out = Vec::new();
        for rule in &self.rules {
            if disabled.contains(rule.name()) {
                continue;
            }
            if rule.assets_on_use_only() != used_only {
                continue;
            }
            if used_only && !used.contains(rule.name()) {
                continue;
            }
            for asset in rule.assets(theme, options) {
                out.push((rule.name().to_owned(), asset));
            }
        }
        out
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::resource::FsResourceModel;
    use std::sync::LazyLock;

    pub(crate) struct ContextFixture {
        pub options: RenderOptions,
        pub theme: Theme,
        pub cache: Arc<MemoryCache>,
        pub highlight_cache: MemoryCache,
        pub sanitizer: HtmlSanitizer,
        pub source: String,
    }

    static MODEL: LazyLock<FsResourceModel> = LazyLock::new(|| FsResourceModel::new("/res"));

    impl ContextFixture {
        pub(crate) fn new() -> Self {
            let cache = Arc::new(MemoryCache::new(50));
            Self {
                options: RenderOptions::default(),
                theme: Theme::default(),
                sanitizer: HtmlSanitizer::new(Arc::clone(&cache)),
                cache,
                highlight_cache: MemoryCache::new(50),
                source: String::new(),
            }
        }

        pub(crate) fn context(&self) -> RenderContext<'_> {
            RenderContext {
                options: &self.options,
                theme: &self.theme,
                cache: &self.cache,
                highlight_cache: &self.highlight_cache,
                sanitizer: &self.sanitizer,
                resource_model: &*MODEL,
                link_stack: Vec::new(),
                checkbox_index: 0,
                pending_checkbox_label: false,
                embed_counts: HashMap::new(),
                rules_used: HashSet::new(),
                source: &self.source,
            }
        }
    }
}
