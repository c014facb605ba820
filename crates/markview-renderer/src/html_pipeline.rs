//! HTML to HTML rendering.
//!
//! Notes whose body is already HTML skip markdown parsing entirely: the
//! body is sanitized, internal image references are rewritten against
//! the resource map, and the result is finalized the same way as a
//! markdown render.

use std::sync::{Arc, Mutex};

use markview_cache::MemoryCache;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::assets::{RenderResult, finalize_render};
use crate::error::RenderError;
use crate::fs_driver::FsDriver;
use crate::html::{self, HtmlVisitor, strip_tags, walk_html};
use crate::options::RenderOptions;
use crate::resolver::escape_quotes_in_url;
use crate::resource::{FetchStatus, ReferenceKind, ResourceModel, ResourceReference};
use crate::sanitize::{HtmlSanitizer, SanitizeOptions};
use crate::theme::Theme;

/// HTML note renderer.
pub struct HtmlToHtml {
    sanitizer: HtmlSanitizer,
    resource_model: Arc<dyn ResourceModel>,
    fs_driver: Arc<dyn FsDriver>,
    output_cache: Mutex<Option<(String, RenderResult)>>,
}

impl HtmlToHtml {
    #[must_use]
    pub fn new(
        cache: Arc<MemoryCache>,
        resource_model: Arc<dyn ResourceModel>,
        fs_driver: Arc<dyn FsDriver>,
    ) -> Self {
        Self {
            sanitizer: HtmlSanitizer::new(cache),
            resource_model,
            fs_driver,
            output_cache: Mutex::new(None),
        }
    }

    fn output_cache_key(body: &str, theme: &Theme, options: &RenderOptions) -> String {
        let mut hasher = Sha256::new();
        hasher.update(body.as_bytes());
        hasher.update([0]);
        hasher.update(options.cache_key_material().as_bytes());
        hasher.update([0]);
        hasher.update(format!("{theme:?}").as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Render an HTML body.
    pub fn render(
        &self,
        body: &str,
        theme: &Theme,
        options: &RenderOptions,
    ) -> Result<RenderResult, RenderError> {
        let cache_key = Self::output_cache_key(body, theme, options);
        {
            let memo = self.output_cache.lock().expect("output cache mutex poisoned");
            if let Some((key, result)) = &*memo {
                if *key == cache_key {
                    debug!("serving html render from output cache");
                    return Ok(result.clone());
                }
            }
        }

        let sanitize_options = SanitizeOptions {
            add_no_md_conv_class: true,
            allowed_file_prefixes: options.allowed_file_prefixes.clone(),
        };
        let sanitized = self.sanitizer.sanitize(body, &sanitize_options);
        let html = rewrite_resource_images(&sanitized, options, &*self.resource_model);

        let result = finalize_render(
            html,
            Vec::new(),
            Vec::new(),
            theme,
            options,
            &*self.fs_driver,
        )?;
        *self.output_cache.lock().expect("output cache mutex poisoned") =
            Some((cache_key, result.clone()));
        Ok(result)
    }

    /// Plain text of an HTML body.
    #[must_use]
    pub fn strip_markup(&self, body: &str, collapse_white_spaces: bool) -> String {
        strip_tags(body, collapse_white_spaces)
    }

    /// Drop the memoized output. Sanitizer entries live in the shared
    /// cache and age out on their own.
    pub fn clear_cache(&self) {
        *self.output_cache.lock().expect("output cache mutex poisoned") = None;
    }
}

/// Rewrite `<img>` sources that reference internal resources. Ready
/// resources point at their local file; pending ones become a status
/// placeholder. Also applied to sanitized raw HTML inside markdown.
pub(crate) fn rewrite_resource_images(
    html: &str,
    options: &RenderOptions,
    resource_model: &dyn ResourceModel,
) -> String {
    let mut visitor = ImgRewriteVisitor {
        out: String::with_capacity(html.len()),
        options,
        resource_model,
    };
    walk_html(html, &mut visitor);
    visitor.out
}

struct ImgRewriteVisitor<'a> {
    out: String,
    options: &'a RenderOptions,
    resource_model: &'a dyn ResourceModel,
}

impl ImgRewriteVisitor<'_> {
    fn rewrite_img(&mut self, attrs: &[(String, String)]) -> bool {
        let Some((_, src)) = attrs.iter().find(|(name, _)| name == "src") else {
            return false;
        };
        let ReferenceKind::Internal(reference) = ResourceReference::parse(src) else {
            return false;
        };

        let Some(info) = self.options.resources.get(&reference.item_id) else {
            self.out.push_str(&placeholder(FetchStatus::Idle));
            return true;
        };
        if info.local_state.fetch_status != FetchStatus::Done {
            self.out.push_str(&placeholder(info.local_state.fetch_status));
            return true;
        }

        let path = self.resource_model.full_path(&info.item);
        let mut rewritten: Vec<(String, String)> = attrs
            .iter()
            .filter(|(name, _)| name != "src")
            .cloned()
            .collect();
        rewritten.push((
            "src".to_owned(),
            escape_quotes_in_url(&format!("file://{path}")),
        ));
        rewritten.push(("data-resource-id".to_owned(), reference.item_id.clone()));
        html::write_open_tag(&mut self.out, "img", &rewritten, true);
        true
    }
}

fn placeholder(status: FetchStatus) -> String {
    format!(
        "<span class=\"not-loaded-resource resource-status-{}\"></span>",
        status.class_name()
    )
}

impl HtmlVisitor for ImgRewriteVisitor<'_> {
    fn open_tag(&mut self, name: &str, attrs: &[(String, String)], self_closing: bool) {
        if name == "img" && self.rewrite_img(attrs) {
            return;
        }
        html::write_open_tag(&mut self.out, name, attrs, self_closing);
    }

    fn text(&mut self, text: &str) {
        self.out.push_str(text);
    }

    fn close_tag(&mut self, name: &str) {
        self.out.push_str("</");
        self.out.push_str(name);
        self.out.push('>');
    }
}
