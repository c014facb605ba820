//! Entry point facade over the per-language pipelines.

use std::sync::Arc;

use markview_cache::MemoryCache;

use crate::assets::{RenderResult, RenderResultPluginAsset};
use crate::error::RenderError;
use crate::fs_driver::FsDriver;
use crate::html_pipeline::HtmlToHtml;
use crate::md_pipeline::MdToHtml;
use crate::options::RenderOptions;
use crate::resource::ResourceModel;
use crate::rules::RenderRule;
use crate::theme::Theme;

/// Capacity of the process-wide content cache shared by both pipelines.
const SHARED_CACHE_RECORDS: usize = 20;

/// Markup language of a note body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarkupLanguage {
    Markdown = 1,
    Html = 2,
}

/// Front door of the renderer: routes each call to the pipeline for the
/// note's markup language. Pipelines are built once and reused so their
/// caches stay warm across calls.
pub struct MarkupToHtml {
    markdown: MdToHtml,
    html: HtmlToHtml,
}

impl MarkupToHtml {
    #[must_use]
    pub fn new(resource_model: Arc<dyn ResourceModel>, fs_driver: Arc<dyn FsDriver>) -> Self {
        let cache = Arc::new(MemoryCache::new(SHARED_CACHE_RECORDS));
        Self {
            markdown: MdToHtml::new(
                Arc::clone(&cache),
                Arc::clone(&resource_model),
                Arc::clone(&fs_driver),
            ),
            html: HtmlToHtml::new(cache, resource_model, fs_driver),
        }
    }

    /// Render a note body to embeddable HTML.
    pub fn render(
        &self,
        language: MarkupLanguage,
        body: &str,
        theme: &Theme,
        options: &RenderOptions,
    ) -> Result<RenderResult, RenderError> {
        match language {
            MarkupLanguage::Markdown => self.markdown.render(body, theme, options),
            MarkupLanguage::Html => self.html.render(body, theme, options),
        }
    }

    /// Extract the plain text of a note body.
    #[must_use]
    pub fn strip_markup(
        &self,
        language: MarkupLanguage,
        body: &str,
        collapse_white_spaces: bool,
    ) -> String {
        match language {
            MarkupLanguage::Markdown => self.markdown.strip_markup(body, collapse_white_spaces),
            MarkupLanguage::Html => self.html.strip_markup(body, collapse_white_spaces),
        }
    }

    /// Every asset the given language's rules may ship for `theme`.
    pub fn all_assets(
        &self,
        language: MarkupLanguage,
        theme: &Theme,
        options: &RenderOptions,
    ) -> Result<Vec<RenderResultPluginAsset>, RenderError> {
        match language {
            MarkupLanguage::Markdown => self.markdown.all_assets(theme, options),
            MarkupLanguage::Html => Ok(Vec::new()),
        }
    }

    /// Drop memoized outputs for one language.
    pub fn clear_cache(&self, language: MarkupLanguage) {
        match language {
            MarkupLanguage::Markdown => self.markdown.clear_cache(),
            MarkupLanguage::Html => self.html.clear_cache(),
        }
    }

    /// Names of the markdown rules, for UI toggling.
    #[must_use]
    pub fn plugin_names(&self) -> Vec<&'static str> {
        self.markdown.plugin_names()
    }

    /// Add a markdown rule beyond the built-in set.
    pub fn register_extra_rule(&mut self, rule: Arc<dyn RenderRule>) -> Result<(), RenderError> {
        self.markdown.register_rule(rule)
    }

    /// Enable or disable a markdown rule by name.
    pub fn set_plugin_enabled(&mut self, name: &str, enabled: bool) {
        self.markdown.set_plugin_enabled(name, enabled);
    }

    /// Extra stylesheet appended after the theme styles in markdown
    /// renders.
    pub fn set_custom_css(&mut self, css: impl Into<String>) {
        self.markdown.set_custom_css(css);
    }
}
