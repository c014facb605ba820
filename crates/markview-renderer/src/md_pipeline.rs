//! Markdown rendering pipeline.
//!
//! One render pass walks the token stream, offering each dispatch point
//! to the rule registry and falling back to a default HTML writer for
//! everything no rule claims. Whole outputs are memoized, but only the
//! most recent render stays resident because outputs can be large.

use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::sync::{Arc, Mutex};

use markview_cache::MemoryCache;
use pulldown_cmark::{
    Alignment, CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd,
};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::assets::{
    PluginAsset, RenderResult, RenderResultPluginAsset, finalize_render, process_plugin_assets,
};
use crate::error::RenderError;
use crate::fs_driver::FsDriver;
use crate::html::{escape_attr, escape_html, strip_tags};
use crate::options::{CheckboxRenderingType, RenderOptions, SettingValue};
use crate::resource::ResourceModel;
use crate::rules::{RenderContext, RenderRule, RuleEvent, RuleOutcome, RuleRegistry};
use crate::sanitize::HtmlSanitizer;
use crate::theme::Theme;

/// Base path resolved plugin asset files are served from.
const PLUGIN_ASSET_PATH: &str = "pluginAssets";

fn parser_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_MATH
}

struct HighlightState {
    /// Caller-supplied scope key; changing it drops all entries so
    /// highlighting from a previous document is never reused.
    scope_key: Option<String>,
    cache: MemoryCache,
}

/// Markdown to HTML renderer.
pub struct MdToHtml {
    registry: RuleRegistry,
    cache: Arc<MemoryCache>,
    sanitizer: HtmlSanitizer,
    resource_model: Arc<dyn ResourceModel>,
    fs_driver: Arc<dyn FsDriver>,
    disabled_rules: HashSet<String>,
    custom_css: String,
    highlight: Mutex<HighlightState>,
    output_cache: Mutex<Option<(String, RenderResult)>>,
    asset_cache: Mutex<HashMap<String, Vec<(String, PluginAsset)>>>,
}

impl MdToHtml {
    #[must_use]
    pub fn new(
        cache: Arc<MemoryCache>,
        resource_model: Arc<dyn ResourceModel>,
        fs_driver: Arc<dyn FsDriver>,
    ) -> Self {
        Self {
            registry: RuleRegistry::with_defaults(),
            sanitizer: HtmlSanitizer::new(Arc::clone(&cache)),
            cache,
            resource_model,
            fs_driver,
            disabled_rules: HashSet::new(),
            custom_css: String::new(),
            highlight: Mutex::new(HighlightState {
                scope_key: None,
                cache: MemoryCache::new(50),
            }),
            output_cache: Mutex::new(None),
            asset_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Extra stylesheet appended after the theme styles.
    pub fn set_custom_css(&mut self, css: impl Into<String>) {
        self.custom_css = css.into();
    }

    /// Add a rule beyond the built-in set.
    pub fn register_rule(&mut self, rule: Arc<dyn RenderRule>) -> Result<(), RenderError> {
        self.registry.register(rule)
    }

    /// All rule names, for UI toggling.
    #[must_use]
    pub fn plugin_names(&self) -> Vec<&'static str> {
        self.registry.plugin_names()
    }

    /// Enable or disable a rule by name.
    pub fn set_plugin_enabled(&mut self, name: &str, enabled: bool) {
        if enabled {
            self.disabled_rules.remove(name);
        } else {
            self.disabled_rules.insert(name.to_owned());
        }
    }

    /// Rules disabled either on this pipeline or through the settings
    /// provider.
    fn disabled_for(&self, options: &RenderOptions) -> HashSet<String> {
        let mut disabled = self.disabled_rules.clone();
        for name in self.registry.plugin_names() {
            if let Some(SettingValue::Bool(false)) =
                options.settings.setting_value(name, "enabled")
            {
                disabled.insert(name.to_owned());
            }
        }
        disabled
    }

    fn output_cache_key(&self, body: &str, theme: &Theme, options: &RenderOptions) -> String {
        let mut hasher = Sha256::new();
        hasher.update(body.as_bytes());
        hasher.update([0]);
        hasher.update(self.custom_css.as_bytes());
        hasher.update([0]);
        hasher.update(options.cache_key_material().as_bytes());
        hasher.update([0]);
        hasher.update(format!("{theme:?}").as_bytes());
        hex::encode(hasher.finalize())
    }

    fn static_assets(
        &self,
        theme: &Theme,
        options: &RenderOptions,
        disabled: &HashSet<String>,
    ) -> Vec<(String, PluginAsset)> {
        let key = format!("{}:{}", theme.cache_key, options.code_theme);
        let mut memo = self.asset_cache.lock().expect("asset cache mutex poisoned");
        memo.entry(key)
            .or_insert_with(|| {
                self.registry
                    .assets(theme, options, &HashSet::new(), false, disabled)
            })
            .clone()
    }

    /// Render `body` to HTML.
    pub fn render(
        &self,
        body: &str,
        theme: &Theme,
        options: &RenderOptions,
    ) -> Result<RenderResult, RenderError> {
        let cache_key = self.output_cache_key(body, theme, options);
        {
            let memo = self.output_cache.lock().expect("output cache mutex poisoned");
            if let Some((key, result)) = &*memo {
                if *key == cache_key {
                    debug!("serving render from output cache");
                    return Ok(result.clone());
                }
            }
        }

        let mut highlight = self.highlight.lock().expect("highlight cache mutex poisoned");
        // Without a scope key nothing carries over between renders;
        // entries still dedupe repeated blocks within one document.
        if options.code_highlight_cache_key.is_none()
            || highlight.scope_key != options.code_highlight_cache_key
        {
            debug!("highlight scope changed, clearing highlight cache");
            highlight.cache.clear();
            highlight.scope_key = options.code_highlight_cache_key.clone();
        }

        let disabled = self.disabled_for(options);
        let ctx = RenderContext {
            options,
            theme,
            cache: &self.cache,
            highlight_cache: &highlight.cache,
            sanitizer: &self.sanitizer,
            resource_model: &*self.resource_model,
            link_stack: Vec::new(),
            checkbox_index: 0,
            pending_checkbox_label: false,
            embed_counts: HashMap::new(),
            rules_used: HashSet::new(),
            source: body,
        };

        let mut writer = MdWriter::new(&self.registry, &disabled, ctx);
        for (event, range) in Parser::new_ext(body, parser_options()).into_offset_iter() {
            writer.process_event(event, &range);
        }
        let (mut html, ctx) = writer.finish();

        let mut all_assets = self.static_assets(theme, options, &disabled);
        all_assets.extend(
            self.registry
                .assets(theme, options, &ctx.rules_used, true, &disabled),
        );
        let (mut css_strings, plugin_assets) =
            process_plugin_assets(&all_assets, PLUGIN_ASSET_PATH)?;
        if !self.custom_css.is_empty() {
            css_strings.push(self.custom_css.clone());
        }

        if options.body_only {
            html = remove_wrapping_paragraph(&html);
        }

        let result = finalize_render(
            html,
            css_strings,
            plugin_assets,
            theme,
            options,
            &*self.fs_driver,
        )?;

        *self.output_cache.lock().expect("output cache mutex poisoned") =
            Some((cache_key, result.clone()));
        Ok(result)
    }

    /// Render `body` to plain text.
    #[must_use]
    pub fn strip_markup(&self, body: &str, collapse_white_spaces: bool) -> String {
        let mut out = String::with_capacity(body.len());
        for event in Parser::new_ext(body, parser_options()) {
            match event {
                Event::Text(text) | Event::Code(text) => out.push_str(&text),
                Event::Html(html) | Event::InlineHtml(html) => {
                    out.push_str(&strip_tags(&html, false));
                }
                Event::SoftBreak | Event::HardBreak => out.push(' '),
                Event::End(
                    TagEnd::Paragraph
                    | TagEnd::Heading(_)
                    | TagEnd::Item
                    | TagEnd::CodeBlock
                    | TagEnd::BlockQuote(_)
                    | TagEnd::TableRow,
                ) => out.push('\n'),
                Event::End(TagEnd::TableCell) => out.push(' '),
                _ => {}
            }
        }
        if collapse_white_spaces {
            out.split_whitespace().collect::<Vec<_>>().join(" ")
        } else {
            out.trim().to_owned()
        }
    }

    /// All assets the built-in rules can ship for `theme`, with inline
    /// CSS flushed to files through the driver.
    pub fn all_assets(
        &self,
        theme: &Theme,
        options: &RenderOptions,
    ) -> Result<Vec<RenderResultPluginAsset>, RenderError> {
        let all_names: HashSet<String> = self
            .registry
            .plugin_names()
            .iter()
            .map(|n| (*n).to_owned())
            .collect();
        let mut assets = self
            .registry
            .assets(theme, options, &all_names, false, &HashSet::new());
        assets.extend(
            self.registry
                .assets(theme, options, &all_names, true, &HashSet::new()),
        );
        let (css_strings, mut resolved) = process_plugin_assets(&assets, PLUGIN_ASSET_PATH)?;
        if !css_strings.is_empty() {
            resolved.push(self.fs_driver.cache_css_to_file(&css_strings.join("\n"))?);
        }
        Ok(resolved)
    }

    /// Drop every memoized render artifact.
    pub fn clear_cache(&self) {
        *self.output_cache.lock().expect("output cache mutex poisoned") = None;
        self.highlight
            .lock()
            .expect("highlight cache mutex poisoned")
            .cache
            .clear();
        self.asset_cache
            .lock()
            .expect("asset cache mutex poisoned")
            .clear();
    }
}

/// Strip a single wrapping paragraph, so one-line notes render without
/// block-level padding.
fn remove_wrapping_paragraph(html: &str) -> String {
    let trimmed = html.trim();
    if let Some(inner) = trimmed
        .strip_prefix("<p>")
        .and_then(|rest| rest.strip_suffix("</p>"))
    {
        if !inner.contains("<p") {
            return inner.to_owned();
        }
    }
    trimmed.to_owned()
}

fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut last_dash = true;
    for c in text.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    slug.trim_end_matches('-').to_owned()
}

struct HeadingCapture {
    level: u8,
    html: String,
    text: String,
}

struct ImageCapture {
    src: String,
    title: String,
    alt: String,
}

struct CodeCapture {
    language: String,
    content: String,
}

enum PendingTag {
    List(Option<u64>),
    Item,
}

/// Streaming writer producing the rendered body.
struct MdWriter<'r> {
    registry: &'r RuleRegistry,
    disabled: &'r HashSet<String>,
    ctx: RenderContext<'r>,
    out: String,
    heading: Option<HeadingCapture>,
    image: Option<ImageCapture>,
    code: Option<CodeCapture>,
    html_block: Option<String>,
    pending: Vec<PendingTag>,
    table_alignments: Vec<Alignment>,
    table_cell_index: usize,
    in_table_head: bool,
    used_slugs: HashMap<String, u32>,
}

impl<'r> MdWriter<'r> {
    fn new(registry: &'r RuleRegistry, disabled: &'r HashSet<String>, ctx: RenderContext<'r>) -> Self {
        Self {
            registry,
            disabled,
            ctx,
            out: String::new(),
            heading: None,
            image: None,
            code: None,
            html_block: None,
            pending: Vec::new(),
            table_alignments: Vec::new(),
            table_cell_index: 0,
            in_table_head: false,
            used_slugs: HashMap::new(),
        }
    }

    fn finish(self) -> (String, RenderContext<'r>) {
        (self.out, self.ctx)
    }

    fn dispatch(&mut self, event: &RuleEvent<'_>) -> Option<String> {
        match self.registry.dispatch(event, &mut self.ctx, self.disabled) {
            RuleOutcome::Html(html) => Some(html),
            RuleOutcome::PassThrough => None,
        }
    }

    /// Append inline content to the innermost active capture.
    fn push_inline(&mut self, content: &str) {
        if let Some(heading) = &mut self.heading {
            heading.html.push_str(content);
        } else {
            self.out.push_str(content);
        }
    }

    /// Write out delayed list markup. Task markers flavor the tags with
    /// checklist classes in CSS-only checkbox mode.
    fn flush_pending(&mut self, task_marker: Option<bool>) {
        let css_only =
            self.ctx.options.checkbox_rendering_type == CheckboxRenderingType::CssOnly;
        for tag in std::mem::take(&mut self.pending) {
            match tag {
                PendingTag::List(start) => match start {
                    Some(1) => self.out.push_str("<ol>"),
                    Some(n) => self.out.push_str(&format!("<ol start=\"{n}\">")),
                    None => {
                        if css_only && task_marker.is_some() {
                            self.out.push_str("<ul class=\"joplin-checklist\">");
                        } else {
                            self.out.push_str("<ul>");
                        }
                    }
                },
                PendingTag::Item => match task_marker {
                    Some(checked) if css_only => {
                        if checked {
                            self.out.push_str("<li class=\"md-checkbox checked\">");
                        } else {
                            self.out.push_str("<li class=\"md-checkbox\">");
                        }
                    }
                    _ => self.out.push_str("<li>"),
                },
            }
        }
    }

    fn process_event(&mut self, event: Event<'_>, range: &Range<usize>) {
        match event {
            Event::Start(tag) => self.start_tag(tag),
            Event::End(tag) => self.end_tag(tag),
            Event::Text(text) => self.text(&text),
            Event::Code(code) => {
                self.flush_pending(None);
                self.push_inline(&format!(
                    "<code class=\"inline-code\">{}</code>",
                    escape_html(&code)
                ));
            }
            Event::Html(html) => match &mut self.html_block {
                Some(buffer) => buffer.push_str(&html),
                None => {
                    self.flush_pending(None);
                    let rendered = self
                        .dispatch(&RuleEvent::HtmlBlock(&html))
                        .unwrap_or_else(|| html.to_string());
                    self.out.push_str(&rendered);
                }
            },
            Event::InlineHtml(html) => {
                self.flush_pending(None);
                let rendered = self
                    .dispatch(&RuleEvent::InlineHtml(&html))
                    .unwrap_or_else(|| html.to_string());
                self.push_inline(&rendered);
            }
            Event::InlineMath(expression) => {
                self.flush_pending(None);
                let rendered = self
                    .dispatch(&RuleEvent::InlineMath(&expression))
                    .unwrap_or_else(|| escape_html(&expression));
                self.push_inline(&rendered);
            }
            Event::DisplayMath(expression) => {
                self.flush_pending(None);
                let rendered = self
                    .dispatch(&RuleEvent::DisplayMath(&expression))
                    .unwrap_or_else(|| escape_html(&expression));
                self.out.push_str(&rendered);
            }
            Event::SoftBreak => {
                self.flush_pending(None);
                self.push_inline("\n");
            }
            Event::HardBreak => {
                self.flush_pending(None);
                self.push_inline("<br/>");
            }
            Event::Rule => {
                self.flush_pending(None);
                self.out.push_str("<hr/>");
            }
            Event::TaskListMarker(checked) => {
                self.flush_pending(Some(checked));
                let rendered = self
                    .dispatch(&RuleEvent::TaskListMarker {
                        checked,
                        offset: range.start,
                    })
                    .unwrap_or_default();
                self.out.push_str(&rendered);
            }
            Event::FootnoteReference(_) => {}
        }
    }

    fn text(&mut self, text: &str) {
        if let Some(code) = &mut self.code {
            code.content.push_str(text);
            return;
        }
        if let Some(image) = &mut self.image {
            image.alt.push_str(text);
            return;
        }
        self.flush_pending(None);
        if let Some(heading) = &mut self.heading {
            heading.text.push_str(text);
        }
        let rendered = self
            .dispatch(&RuleEvent::Text(text))
            .unwrap_or_else(|| escape_html(text));
        self.push_inline(&rendered);
    }

    fn start_tag(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::List(start) => {
                self.flush_pending(None);
                self.pending.push(PendingTag::List(start));
            }
            Tag::Item => {
                self.pending.push(PendingTag::Item);
            }
            other => {
                self.flush_pending(None);
                self.start_tag_flushed(other);
            }
        }
    }

    fn start_tag_flushed(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => self.out.push_str("<p>"),
            Tag::Heading { level, .. } => {
                self.heading = Some(HeadingCapture {
                    level: heading_level_to_num(level),
                    html: String::new(),
                    text: String::new(),
                });
            }
            Tag::BlockQuote(_) => self.out.push_str("<blockquote>"),
            Tag::CodeBlock(kind) => {
                let language = match kind {
                    CodeBlockKind::Fenced(info) => info
                        .split_whitespace()
                        .next()
                        .unwrap_or_default()
                        .to_owned(),
                    CodeBlockKind::Indented => String::new(),
                };
                self.code = Some(CodeCapture {
                    language,
                    content: String::new(),
                });
            }
            Tag::HtmlBlock => {
                self.html_block = Some(String::new());
            }
            Tag::Table(alignments) => {
                self.table_alignments = alignments;
                self.out.push_str("<table>");
            }
            Tag::TableHead => {
                self.in_table_head = true;
                self.out.push_str("<thead><tr>");
            }
            Tag::TableRow => {
                self.table_cell_index = 0;
                self.out.push_str("<tr>");
            }
            Tag::TableCell => {
                let align = match self.table_alignments.get(self.table_cell_index) {
                    Some(Alignment::Left) => " style=\"text-align: left\"",
                    Some(Alignment::Center) => " style=\"text-align: center\"",
                    Some(Alignment::Right) => " style=\"text-align: right\"",
                    _ => "",
                };
                let tag = if self.in_table_head { "th" } else { "td" };
                self.out.push_str(&format!("<{tag}{align}>"));
            }
            Tag::Emphasis => self.push_inline("<em>"),
            Tag::Strong => self.push_inline("<strong>"),
            Tag::Strikethrough => self.push_inline("<s>"),
            Tag::Link {
                dest_url, title, ..
            } => {
                let title_opt = if title.is_empty() {
                    None
                } else {
                    Some(title.as_ref())
                };
                let rendered = self
                    .dispatch(&RuleEvent::LinkOpen {
                        href: &dest_url,
                        title: title_opt,
                    })
                    .unwrap_or_else(|| format!("<a href=\"{}\">", escape_attr(&dest_url)));
                self.push_inline(&rendered);
            }
            Tag::Image {
                dest_url, title, ..
            } => {
                self.image = Some(ImageCapture {
                    src: dest_url.to_string(),
                    title: title.to_string(),
                    alt: String::new(),
                });
            }
            // Handled in start_tag.
            Tag::List(_) | Tag::Item => {}
            _ => {}
        }
    }

    fn end_tag(&mut self, tag: TagEnd) {
        self.flush_pending(None);
        match tag {
            TagEnd::Paragraph => self.out.push_str("</p>"),
            TagEnd::Heading(_) => {
                if let Some(heading) = self.heading.take() {
                    let slug = self.unique_slug(&heading.text);
                    self.out.push_str(&format!(
                        "<h{level} id=\"{slug}\">{}</h{level}>",
                        heading.html.trim(),
                        level = heading.level,
                    ));
                }
            }
            TagEnd::BlockQuote(_) => self.out.push_str("</blockquote>"),
            TagEnd::CodeBlock => {
                if let Some(code) = self.code.take() {
                    let rendered = self
                        .dispatch(&RuleEvent::CodeBlock {
                            language: &code.language,
                            content: &code.content,
                        })
                        .unwrap_or_else(|| {
                            format!("<pre><code>{}</code></pre>", escape_html(&code.content))
                        });
                    self.out.push_str(&rendered);
                }
            }
            TagEnd::HtmlBlock => {
                if let Some(html) = self.html_block.take() {
                    let rendered = self
                        .dispatch(&RuleEvent::HtmlBlock(&html))
                        .unwrap_or(html);
                    self.out.push_str(&rendered);
                }
            }
            TagEnd::List(ordered) => {
                self.out.push_str(if ordered { "</ol>" } else { "</ul>" });
            }
            TagEnd::Item => {
                if self.ctx.pending_checkbox_label {
                    self.ctx.pending_checkbox_label = false;
                    self.out.push_str("</label>");
                }
                self.out.push_str("</li>");
            }
            TagEnd::Table => self.out.push_str("</tbody></table>"),
            TagEnd::TableHead => {
                self.in_table_head = false;
                self.out.push_str("</tr></thead><tbody>");
            }
            TagEnd::TableRow => self.out.push_str("</tr>"),
            TagEnd::TableCell => {
                self.table_cell_index += 1;
                self.out
                    .push_str(if self.in_table_head { "</th>" } else { "</td>" });
            }
            TagEnd::Emphasis => self.push_inline("</em>"),
            TagEnd::Strong => self.push_inline("</strong>"),
            TagEnd::Strikethrough => self.push_inline("</s>"),
            TagEnd::Link => {
                let rendered = self
                    .dispatch(&RuleEvent::LinkClose)
                    .unwrap_or_else(|| "</a>".to_owned());
                self.push_inline(&rendered);
            }
            TagEnd::Image => {
                if let Some(image) = self.image.take() {
                    let title_opt = if image.title.is_empty() {
                        None
                    } else {
                        Some(image.title.as_str())
                    };
                    let rendered = self
                        .dispatch(&RuleEvent::Image {
                            src: &image.src,
                            alt: &image.alt,
                            title: title_opt,
                        })
                        .unwrap_or_else(|| default_image(&image));
                    self.push_inline(&rendered);
                }
            }
            _ => {}
        }
    }

    fn unique_slug(&mut self, text: &str) -> String {
        let base = slugify(text);
        let count = self.used_slugs.entry(base.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            base
        } else {
            format!("{base}-{}", *count - 1)
        }
    }
}

fn default_image(image: &ImageCapture) -> String {
    let title_attr = if image.title.is_empty() {
        String::new()
    } else {
        format!(" title=\"{}\"", escape_attr(&image.title))
    };
    format!(
        "<img src=\"{}\" alt=\"{}\"{title_attr}/>",
        escape_attr(&image.src),
        escape_attr(&image.alt)
    )
}

fn heading_level_to_num(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs_driver::NullFsDriver;
    use crate::resource::FsResourceModel;
    use pretty_assertions::assert_eq;

    fn pipeline() -> MdToHtml {
        MdToHtml::new(
            Arc::new(MemoryCache::new(20)),
            Arc::new(FsResourceModel::new("/res")),
            Arc::new(NullFsDriver),
        )
    }

    fn body_only() -> RenderOptions {
        RenderOptions {
            body_only: true,
            ..RenderOptions::default()
        }
    }

    fn render_body(body: &str) -> String {
        pipeline()
            .render(body, &Theme::default(), &body_only())
            .expect("render should succeed")
            .html
    }

    #[test]
    fn test_heading_gets_slug_id() {
        assert_eq!(
            render_body("# (r) and (c)"),
            "<h1 id=\"r-and-c\">(r) and (c)</h1>"
        );
    }

    #[test]
    fn test_duplicate_headings_deduped() {
        let html = render_body("# Title\n\n# Title");
        assert!(html.contains("id=\"title\""));
        assert!(html.contains("id=\"title-1\""));
    }

    #[test]
    fn test_body_only_unwraps_single_paragraph() {
        assert_eq!(render_body("just text"), "just text");
    }

    #[test]
    fn test_multiple_paragraphs_keep_wrapping() {
        let html = render_body("one\n\ntwo");
        assert_eq!(html, "<p>one</p><p>two</p>");
    }

    #[test]
    fn test_full_output_wrapped_with_style() {
        let md = pipeline();
        let result = md
            .render("hello", &Theme::default(), &RenderOptions::default())
            .unwrap();
        assert!(result.html.starts_with("<style>"));
        assert!(result.html.contains("<div id=\"rendered-md\"><p>hello</p></div>"));
    }

    #[test]
    fn test_second_render_served_from_cache() {
        let md = pipeline();
        let options = body_only();
        let first = md.render("# A", &Theme::default(), &options).unwrap();
        let second = md.render("# A", &Theme::default(), &options).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_cache_hit_skips_rendering_work() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct CountingRule(Arc<AtomicUsize>);

        impl RenderRule for CountingRule {
            fn name(&self) -> &'static str {
                "counting"
            }

            fn handle(
                &self,
                event: &RuleEvent<'_>,
                _ctx: &mut RenderContext<'_>,
            ) -> RuleOutcome {
                if matches!(event, RuleEvent::Text(_)) {
                    self.0.fetch_add(1, Ordering::SeqCst);
                }
                RuleOutcome::PassThrough
            }
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let mut md = pipeline();
        md.register_rule(Arc::new(CountingRule(Arc::clone(&calls))))
            .unwrap();

        let options = body_only();
        let _ = md.render("some text", &Theme::default(), &options).unwrap();
        let after_first = calls.load(Ordering::SeqCst);
        assert!(after_first > 0);

        let _ = md.render("some text", &Theme::default(), &options).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), after_first);
    }

    #[test]
    fn test_only_last_output_kept() {
        let md = pipeline();
        let options = body_only();
        let _ = md.render("# A", &Theme::default(), &options).unwrap();
        let _ = md.render("# B", &Theme::default(), &options).unwrap();
        let memo = md.output_cache.lock().unwrap();
        let (key, _) = memo.as_ref().unwrap();
        assert_eq!(
            *key,
            md.output_cache_key("# B", &Theme::default(), &options)
        );
    }

    #[test]
    fn test_option_change_misses_cache() {
        let md = pipeline();
        let a = md
            .render("`x`", &Theme::default(), &body_only())
            .unwrap();
        let mut options = body_only();
        options.highlighted_keywords = vec!["x".to_owned()];
        let b = md.render("`x`", &Theme::default(), &options).unwrap();
        // Same source, different options: must not reuse the first
        // output.
        assert_eq!(a.html, b.html);
        assert_ne!(
            md.output_cache_key("`x`", &Theme::default(), &body_only()),
            md.output_cache_key("`x`", &Theme::default(), &options)
        );
    }

    #[test]
    fn test_code_block_rendered_editable() {
        let html = render_body("```rs\nlet x = 1;\n```");
        assert!(html.contains("joplin-editable"));
        assert!(html.contains("class=\"hljs\""));
    }

    #[test]
    fn test_highlight_cache_key_change_clears_cache() {
        let md = pipeline();
        let mut options = body_only();
        options.code_highlight_cache_key = Some("note-1".to_owned());
        let _ = md
            .render("```rs\nlet x = 1;\n```", &Theme::default(), &options)
            .unwrap();
        assert_eq!(md.highlight.lock().unwrap().cache.len(), 1);

        options.code_highlight_cache_key = Some("note-2".to_owned());
        let _ = md
            .render("```js\nvar y = 2;\n```", &Theme::default(), &options)
            .unwrap();
        let highlight = md.highlight.lock().unwrap();
        assert_eq!(highlight.scope_key.as_deref(), Some("note-2"));
        assert_eq!(highlight.cache.len(), 1);
    }

    #[test]
    fn test_splitted_output_keeps_css_separate() {
        let md = pipeline();
        let options = RenderOptions {
            splitted: true,
            ..RenderOptions::default()
        };
        let result = md.render("hello", &Theme::default(), &options).unwrap();
        assert_eq!(result.html, "<div id=\"rendered-md\"><p>hello</p></div>");
        assert!(!result.html.contains("<style>"));
        assert!(!result.css_strings.is_empty());
    }

    #[test]
    fn test_unscoped_highlight_cache_cleared_between_renders() {
        let md = pipeline();
        let options = body_only();
        assert!(options.code_highlight_cache_key.is_none());
        let _ = md
            .render("```rs\nlet x = 1;\n```", &Theme::default(), &options)
            .unwrap();
        assert_eq!(md.highlight.lock().unwrap().cache.len(), 1);

        let _ = md.render("plain text", &Theme::default(), &options).unwrap();
        assert!(md.highlight.lock().unwrap().cache.is_empty());
    }

    #[test]
    fn test_script_scheme_link_never_reaches_output() {
        for body in [
            "[click](javascript:alert(1))",
            "[click](vbscript:msgbox(1))",
        ] {
            let html = render_body(body);
            assert!(!html.contains("javascript:"), "unsafe href in {html}");
            assert!(!html.contains("vbscript:"), "unsafe href in {html}");
            assert!(html.contains("<a href=\"#\">click</a>"));
        }
    }

    #[test]
    fn test_absent_resource_image_gets_placeholder() {
        let id = "0123456789abcdef0123456789abcdef";
        let html = render_body(&format!("![alt](:/{id})"));
        assert!(html.contains("resource-status-notDownloaded"));
        assert!(!html.contains("<img"));
        assert!(!html.contains(":/0123"));
    }

    #[test]
    fn test_html_block_resource_image_resolved() {
        use crate::resource::{FetchStatus, LocalState, ResourceInfo, ResourceItem};

        let id = "0123456789abcdef0123456789abcdef";
        let md = pipeline();
        let mut options = body_only();
        options.resources.insert(
            id.to_owned(),
            ResourceInfo {
                item: ResourceItem {
                    id: id.to_owned(),
                    title: "pic".to_owned(),
                    mime: "image/png".to_owned(),
                    file_extension: "png".to_owned(),
                },
                local_state: LocalState {
                    fetch_status: FetchStatus::Done,
                },
            },
        );
        let html = md
            .render(
                &format!("<img src=\":/{id}\">"),
                &Theme::default(),
                &options,
            )
            .unwrap()
            .html;
        assert!(html.contains(&format!("data-resource-id=\"{id}\"")));
        assert!(html.contains("src=\"file:///res/"));
    }

    #[test]
    fn test_mermaid_fence_rendered_as_diagram() {
        let md = pipeline();
        let result = md
            .render(
                "```mermaid\ngraph TD;\nA-->B;\n```",
                &Theme::default(),
                &body_only(),
            )
            .unwrap();
        assert!(result.html.contains("<div class=\"mermaid\">"));
        assert!(!result.html.contains("class=\"hljs\""));
        assert!(result.plugin_assets.iter().any(|a| a.source == "mermaid"));
    }

    #[test]
    fn test_mermaid_assets_only_when_used() {
        let md = pipeline();
        let result = md
            .render("no diagrams", &Theme::default(), &body_only())
            .unwrap();
        assert!(!result.plugin_assets.iter().any(|a| a.source == "mermaid"));
    }

    #[test]
    fn test_task_list_default_mode() {
        let html = render_body("- [ ] todo\n- [x] done");
        assert!(html.contains("<input type=\"checkbox\" id=\"md-checkbox-1\""));
        assert!(html.contains("checked=\"checked\""));
        assert!(html.contains("checkboxclick:"));
        assert!(html.contains("</label></li>"));
    }

    #[test]
    fn test_task_list_css_only_mode() {
        let md = pipeline();
        let mut options = body_only();
        options.checkbox_rendering_type = CheckboxRenderingType::CssOnly;
        let html = md
            .render("- [ ] todo\n- [x] done", &Theme::default(), &options)
            .unwrap()
            .html;
        assert!(html.contains("<ul class=\"joplin-checklist\">"));
        assert!(html.contains("<li class=\"md-checkbox\">"));
        assert!(html.contains("<li class=\"md-checkbox checked\">"));
        assert!(!html.contains("<input"));
    }

    #[test]
    fn test_raw_html_sanitized() {
        let html = render_body(
            "<p onclick=\"evil()\">hi</p>\n\n<script>bad()</script>\n\n<p>two</p>",
        );
        assert!(html.contains("<p>hi</p>"));
        assert!(html.contains("<p>two</p>"));
        assert!(!html.contains("onclick"));
        assert!(!html.contains("<script"));
    }

    #[test]
    fn test_math_assets_only_when_used() {
        let md = pipeline();
        let options = body_only();
        let without = md
            .render("no math here", &Theme::default(), &options)
            .unwrap();
        assert!(!without
            .plugin_assets
            .iter()
            .any(|a| a.source == "katex"));

        let with = md
            .render("$x^2$", &Theme::default(), &options)
            .unwrap();
        assert!(with.plugin_assets.iter().any(|a| a.source == "katex"));
        assert!(with.html.contains("joplin-katex"));
    }

    #[test]
    fn test_table_rendering() {
        let html = render_body("| a | b |\n|---|--:|\n| 1 | 2 |");
        assert!(html.contains("<table><thead><tr><th>a</th>"));
        assert!(html.contains("<td style=\"text-align: right\">2</td>"));
        assert!(html.ends_with("</tbody></table>"));
    }

    #[test]
    fn test_strip_markup() {
        let md = pipeline();
        assert_eq!(
            md.strip_markup("# Title\n\nSome **bold** text", false),
            "Title\nSome bold text"
        );
        assert_eq!(
            md.strip_markup("# A\n\n B \n\n C ", true),
            "A B C"
        );
    }

    #[test]
    fn test_disabled_rule_falls_back() {
        let mut md = pipeline();
        md.set_plugin_enabled("katex", false);
        let html = md
            .render("$x^2$", &Theme::default(), &body_only())
            .unwrap()
            .html;
        assert!(!html.contains("joplin-katex"));
        assert!(html.contains("x^2"));
    }

    #[test]
    fn test_clear_cache() {
        let md = pipeline();
        let _ = md.render("# A", &Theme::default(), &body_only()).unwrap();
        md.clear_cache();
        assert!(md.output_cache.lock().unwrap().is_none());
    }
}
