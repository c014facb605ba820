//! Whitelist-based HTML sanitizer.
//!
//! Rewrites untrusted HTML so it is safe to inject into a script-isolated
//! view. Disallowed elements are dropped with their whole subtree, event
//! handler attributes are stripped, and `href` values are replaced unless
//! they match a small allow list. The output is fully balanced regardless
//! of how malformed the input was: close tags are reconstructed from the
//! open-tag stack and stray closes are ignored.
//!
//! Sanitization is idempotent (`sanitize(sanitize(x)) == sanitize(x)`)
//! and results are memoized in the shared [`MemoryCache`] keyed by a
//! content hash of the input and options.

use std::sync::Arc;
use std::sync::LazyLock;

use markview_cache::{CacheExt, MemoryCache};
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::html::{self, HtmlVisitor, is_void_element, walk_html};
use crate::resource::is_item_id;

/// Elements dropped together with everything nested inside them:
/// script equivalents, frames/objects/embeds, form controls, the
/// style-breaking raw-text elements, and image maps.
const DISALLOWED_ELEMENTS: &[&str] = &[
    "script", "noscript", "iframe", "frameset", "frame", "object", "base", "embed", "link",
    "meta", "noembed", "noframes", "plaintext", "xmp", "style", "map", "area", "button",
    "input", "select", "textarea", "option", "optgroup",
];

// `form` keeps its content but is neutralized to this container.
const FORM_REPLACEMENT: &str = "div";

/// Attribute marking anchors produced by the resource link resolver.
/// Stripped on input so injected markup cannot masquerade as resolved.
pub(crate) const FROM_MD_ATTR: &str = "data-from-md";

static ALLOWED_HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i)(https?:|mailto:|joplin:)").expect("valid regex")
});

static ANCHOR_ONLY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#[a-zA-Z0-9\-_.:]+$").expect("valid regex"));

/// Options for one sanitization pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SanitizeOptions {
    /// Tag kept elements with a class marking them as pre-rendered HTML
    /// that later markup conversion must leave alone.
    pub add_no_md_conv_class: bool,
    /// `file://` prefixes allowed through in `href` values.
    pub allowed_file_prefixes: Vec<String>,
}

/// Whitelist HTML rewriter with shared-cache memoization.
pub struct HtmlSanitizer {
    cache: Arc<MemoryCache>,
}

impl HtmlSanitizer {
    /// Create a sanitizer memoizing into `cache`.
    #[must_use]
    pub fn new(cache: Arc<MemoryCache>) -> Self {
        Self { cache }
    }

    /// Sanitize a complete HTML fragment.
    #[must_use]
    pub fn sanitize(&self, input: &str, options: &SanitizeOptions) -> String {
        let cache_key = Self::cache_key("sanitize", input, options);
        if let Some(cached) = self.cache.get_string(&cache_key) {
            return cached;
        }

        let output = sanitize_uncached(input, options);
        self.cache.set_string(&cache_key, &output, None);
        output
    }

    /// Sanitize a token-level partial fragment, e.g. an isolated opening
    /// `<a href="#">`.
    ///
    /// A non-self-closed opening tag would be "completed" by a general
    /// parser into invalid-for-context HTML, so it is sanitized as a
    /// synthetic whole element and the synthetic close tag is stripped
    /// again afterwards.
    #[must_use]
    pub fn sanitize_fragment(&self, input: &str, options: &SanitizeOptions) -> String {
        let cache_key = Self::cache_key("sanitize_fragment", input, options);
        if let Some(cached) = self.cache.get_string(&cache_key) {
            return cached;
        }

        let output = match fragment_open_tag_name(input) {
            Some(name) => {
                let sanitized = sanitize_uncached(input, options);
                let synthetic_close = format!("</{name}>");
                sanitized
                    .strip_suffix(&synthetic_close)
                    .map_or(sanitized.clone(), ToOwned::to_owned)
            }
            None => sanitize_uncached(input, options),
        };

        self.cache.set_string(&cache_key, &output, None);
        output
    }

    fn cache_key(prefix: &str, input: &str, options: &SanitizeOptions) -> String {
        let mut hasher = Sha256::new();
        hasher.update(input.as_bytes());
        hasher.update(format!("{options:?}").as_bytes());
        format!("{prefix}:{}", hex::encode(hasher.finalize()))
    }
}

/// If `fragment` consists of exactly one non-self-closed opening tag,
/// return its name.
fn fragment_open_tag_name(fragment: &str) -> Option<String> {
    let trimmed = fragment.trim();
    if !trimmed.starts_with('<') || !trimmed.ends_with('>') || trimmed.starts_with("</") {
        return None;
    }
    if trimmed.ends_with("/>") {
        return None;
    }
    // Exactly one tag: no second '<'.
    if trimmed[1..].contains('<') {
        return None;
    }
    let name: String = trimmed[1..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect();
    if name.is_empty() || is_void_element(&name.to_ascii_lowercase()) {
        None
    } else {
        Some(name.to_ascii_lowercase())
    }
}

fn sanitize_uncached(input: &str, options: &SanitizeOptions) -> String {
    let mut visitor = SanitizeVisitor {
        out: String::with_capacity(input.len()),
        stack: Vec::new(),
        skip: None,
        options,
    };
    walk_html(input, &mut visitor);
    visitor.finish()
}

struct SanitizeVisitor<'a> {
    out: String,
    // Open tags that still need a reconstructed close tag.
    stack: Vec<String>,
    // While dropping a disallowed subtree: (element name, nesting depth).
    skip: Option<(String, usize)>,
    options: &'a SanitizeOptions,
}

impl SanitizeVisitor<'_> {
    fn finish(mut self) -> String {
        while let Some(name) = self.stack.pop() {
            self.out.push_str("</");
            self.out.push_str(&name);
            self.out.push('>');
        }
        self.out
    }

    fn href_is_allowed(&self, href: &str) -> bool {
        if ALLOWED_HREF_RE.is_match(href) || ANCHOR_ONLY_RE.is_match(href) {
            return true;
        }
        if is_item_id(href.trim_start_matches(":/")) {
            return true;
        }
        if href.to_ascii_lowercase().starts_with("file://") {
            return self
                .options
                .allowed_file_prefixes
                .iter()
                .any(|prefix| href.to_ascii_lowercase().starts_with(&prefix.to_ascii_lowercase()));
        }
        false
    }

    fn filter_attrs(&self, name: &str, attrs: &[(String, String)]) -> Vec<(String, String)> {
        let mut kept: Vec<(String, String)> = Vec::with_capacity(attrs.len());
        for (attr_name, value) in attrs {
            // Universal event-handler filter: any on* attribute goes.
            if attr_name.len() > 2 && attr_name.starts_with("on") {
                continue;
            }
            if attr_name == FROM_MD_ATTR {
                continue;
            }
            if attr_name == "href" && !self.href_is_allowed(value) {
                kept.push(("href".to_owned(), "#".to_owned()));
                continue;
            }
            kept.push((attr_name.clone(), value.clone()));
        }

        // Some viewers silently drop content around an anchor with no
        // href at all, so anchors always carry one.
        if name == "a" && !kept.iter().any(|(n, _)| n == "href") {
            kept.push(("href".to_owned(), "#".to_owned()));
        }

        if self.options.add_no_md_conv_class {
            match kept.iter_mut().find(|(n, _)| n == "class") {
                Some((_, class)) => {
                    if !class.split_whitespace().any(|c| c == "no-md-conv") {
                        class.push_str(" no-md-conv");
                    }
                }
                None => kept.push(("class".to_owned(), "no-md-conv".to_owned())),
            }
        }
        kept
    }
}

impl HtmlVisitor for SanitizeVisitor<'_> {
    fn open_tag(&mut self, name: &str, attrs: &[(String, String)], self_closing: bool) {
        if let Some((skip_name, depth)) = &mut self.skip {
            if name == skip_name && !self_closing && !is_void_element(name) {
                *depth += 1;
            }
            return;
        }

        if DISALLOWED_ELEMENTS.contains(&name) {
            if !self_closing && !is_void_element(name) {
                self.skip = Some((name.to_owned(), 1));
            }
            return;
        }

        let name = if name == "form" { FORM_REPLACEMENT } else { name };
        let kept = self.filter_attrs(name, attrs);

        if is_void_element(name) || self_closing {
            html::write_open_tag(&mut self.out, name, &kept, true);
        } else {
            html::write_open_tag(&mut self.out, name, &kept, false);
            self.stack.push(name.to_owned());
        }
    }

    fn text(&mut self, text: &str) {
        if self.skip.is_none() {
            self.out.push_str(text);
        }
    }

    fn close_tag(&mut self, name: &str) {
        if let Some((skip_name, depth)) = &mut self.skip {
            if name == skip_name {
                *depth -= 1;
                if *depth == 0 {
                    self.skip = None;
                }
            }
            return;
        }

        let name = if name == "form" { FORM_REPLACEMENT } else { name };

        // Stray close with no matching open: ignore.
        let Some(open_at) = self.stack.iter().rposition(|n| n == name) else {
            return;
        };
        // Reconstruct closes for everything the source left open.
        while self.stack.len() > open_at {
            let unclosed = self.stack.pop().expect("checked non-empty");
            self.out.push_str("</");
            self.out.push_str(&unclosed);
            self.out.push('>');
        }
    }
}
