//! Resolution of internal item references into concrete HTML.
//!
//! A reference like `:/32hexid` or `joplin://32hexid#hash` is looked up
//! in the caller-supplied resource map and turned into an anchor, image
//! or media player depending on readiness, MIME type and render mode.
//! External links pass through with quoting made safe for single-quoted
//! attributes.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value as JsonValue;

use crate::event_attrs::event_handling_attrs;
use crate::html::escape_attr;
use crate::options::{LinkRenderingType, RenderOptions};
use crate::resource::{FetchStatus, ReferenceKind, ResourceInfo, ResourceModel, ResourceReference};
use crate::theme::Theme;

static UNSAFE_SCHEME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?i)\s*(vbscript|javascript|data):").expect("valid regex"));

static SAFE_DATA_IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i)data:image/(gif|png|jpeg|webp);").expect("valid regex")
});

/// Whether a non-internal link target may be emitted as an `href` and
/// wired to a click handler. Script-executing schemes are rejected;
/// `data:` only carries through for common image payloads.
fn href_scheme_allowed(href: &str) -> bool {
    let trimmed = href.trim();
    !UNSAFE_SCHEME_RE.is_match(trimmed) || SAFE_DATA_IMAGE_RE.is_match(trimmed)
}

/// Inline placeholder icon shown while a resource's bytes are missing.
const STATUS_ICON_SVG: &str = "<svg width=\"16\" height=\"16\" viewBox=\"0 0 16 16\" xmlns=\"http://www.w3.org/2000/svg\"><circle cx=\"8\" cy=\"8\" r=\"6\" fill=\"none\" stroke=\"currentColor\" stroke-width=\"2\"/></svg>";

/// Result of resolving one link reference.
#[derive(Clone, Debug)]
pub struct LinkReplacement {
    /// Opening-anchor markup (the link text and `</a>` come from the
    /// surrounding token stream).
    pub html: String,
    /// Whether the underlying bytes are available.
    pub resource_ready: bool,
    pub resource: Option<ResourceInfo>,
    pub resource_full_path: Option<String>,
    /// Parsed internal reference, kept so the close handler can emit a
    /// media player for the resource after the anchor.
    pub reference: Option<ResourceReference>,
}

impl LinkReplacement {
    fn passthrough(html: String) -> Self {
        Self {
            html,
            resource_ready: true,
            resource: None,
            resource_full_path: None,
            reference: None,
        }
    }
}

/// Percent-encode single quotes so a URL can sit inside a single-quoted
/// attribute or a single-quoted JS string without terminating it.
#[must_use]
pub fn escape_quotes_in_url(url: &str) -> String {
    url.replace('\'', "%27")
}

/// Quote a string as a JS string literal for inline handlers.
fn js_string(value: &str) -> String {
    JsonValue::from(value).to_string()
}

/// CSS icon class for a resource MIME type.
#[must_use]
pub fn mime_to_icon_class(mime: &str) -> &'static str {
    let mime = mime.to_ascii_lowercase();
    if mime == "application/pdf" {
        "fa-file-pdf"
    } else if mime.starts_with("audio/") {
        "fa-file-audio"
    } else if mime.starts_with("video/") {
        "fa-file-video"
    } else if mime.starts_with("image/") {
        "fa-file-image"
    } else if mime.starts_with("text/") {
        "fa-file-alt"
    } else {
        "fa-file"
    }
}

fn click_handler(href: &str, resource_id: &str, options: &RenderOptions) -> String {
    let action = format!(
        "{}({}, {{ resourceId: {} }});",
        options.post_message_syntax,
        js_string(href),
        js_string(resource_id)
    );
    event_handling_attrs(resource_id, options, Some(&action))
}

fn status_placeholder(status: FetchStatus, title: Option<&str>) -> String {
    let title_attr = title.map_or_else(String::new, |t| format!(" title='{}'", escape_attr(t)));
    format!(
        "<a class=\"not-loaded-resource resource-status-{}\" href=\"#\"{title_attr}>{STATUS_ICON_SVG}",
        status.class_name()
    )
}

/// Resolve `href` into opening-anchor markup.
///
/// Non-internal links are kept, re-quoted and wired to the
/// host-messaging click handler. Internal references branch on
/// well-formedness, map presence and fetch status as described on each
/// arm below.
#[must_use]
pub fn link_replacement(
    href: &str,
    title: Option<&str>,
    options: &RenderOptions,
    resource_model: &dyn ResourceModel,
) -> LinkReplacement {
    match ResourceReference::parse(href) {
        ReferenceKind::External => {
            // A script-executing scheme must never reach an href or a
            // click handler; the anchor is kept but disarmed.
            if !href_scheme_allowed(href) {
                return LinkReplacement::passthrough("<a href=\"#\">".to_owned());
            }
            let safe_href = escape_quotes_in_url(href);
            let title_attr =
                title.map_or_else(String::new, |t| format!(" title='{}'", escape_attr(t)));
            let attrs = match options.link_rendering_type {
                LinkRenderingType::JavaScriptHandler => click_handler(&safe_href, "", options),
                LinkRenderingType::HrefHandler => String::new(),
            };
            LinkReplacement::passthrough(format!(
                "<a data-from-md{title_attr} href='{safe_href}'{attrs}>"
            ))
        }
        // Matches the internal scheme but the id is not 32 hex chars.
        ReferenceKind::Malformed => LinkReplacement {
            html: "<a class=\"resource-link resource-status-invalid\" href=\"#\">".to_owned(),
            resource_ready: false,
            resource: None,
            resource_full_path: None,
            reference: None,
        },
        ReferenceKind::Internal(reference) => {
            resolve_internal(&reference, title, options, resource_model)
        }
    }
}

fn resolve_internal(
    reference: &ResourceReference,
    title: Option<&str>,
    options: &RenderOptions,
    resource_model: &dyn ResourceModel,
) -> LinkReplacement {
    let info = options.resources.get(&reference.item_id).cloned();

    let status = info
        .as_ref()
        .map_or(FetchStatus::Idle, |i| i.local_state.fetch_status);
    let ready = status == FetchStatus::Done;

    if !ready && !options.plain_resource_rendering {
        return LinkReplacement {
            html: status_placeholder(status, title),
            resource_ready: false,
            resource: info,
            resource_full_path: None,
            reference: Some(reference.clone()),
        };
    }

    let item = info.as_ref().map(|i| i.item.clone());
    let full_path = item.as_ref().map(|item| resource_model.full_path(item));
    let display_title = title
        .map(ToOwned::to_owned)
        .or_else(|| item.as_ref().map(|i| i.title.clone()))
        .unwrap_or_default();
    let title_attr = if display_title.is_empty() {
        String::new()
    } else {
        format!(" title='{}'", escape_attr(&display_title))
    };

    // A caller-supplied URL override takes precedence over local
    // resolution and suppresses the default icon.
    if let Some(handler) = &options.item_id_to_url {
        if let Some(url) = handler(&reference.item_id, reference.hash.as_deref().unwrap_or("")) {
            return LinkReplacement {
                html: format!(
                    "<a data-from-md{title_attr} href='{}'>",
                    escape_quotes_in_url(&url)
                ),
                resource_ready: true,
                resource: info,
                resource_full_path: None,
                reference: Some(reference.clone()),
            };
        }
    }

    let mime = item.as_ref().map(|i| i.mime.clone()).unwrap_or_default();
    let open_url = match &reference.hash {
        Some(hash) => format!("joplin://{}#{hash}", reference.item_id),
        None => format!("joplin://{}", reference.item_id),
    };

    if options.plain_resource_rendering
        || options.link_rendering_type == LinkRenderingType::HrefHandler
    {
        let href = full_path
            .clone()
            .unwrap_or_else(|| open_url.clone());
        return LinkReplacement {
            html: format!(
                "<a data-from-md data-resource-id='{}'{title_attr} href='{}' type='{}'>",
                reference.item_id,
                escape_quotes_in_url(&href),
                escape_attr(&mime)
            ),
            resource_ready: true,
            resource: info,
            resource_full_path: full_path,
            reference: Some(reference.clone()),
        };
    }

    let icon = format!(
        "<span class=\"resource-icon {}\"></span>",
        mime_to_icon_class(&mime)
    );
    let attrs = click_handler(&escape_quotes_in_url(&open_url), &reference.item_id, options);
    LinkReplacement {
        html: format!(
            "<a data-from-md data-resource-id='{}' class=\"resource-link\"{title_attr} href='#' type='{}'{attrs}>{icon}",
            reference.item_id,
            escape_attr(&mime)
        ),
        resource_ready: true,
        resource: info,
        resource_full_path: full_path,
        reference: Some(reference.clone()),
    }
}

/// Resolve an image reference into a complete `<img>` element, or a
/// status placeholder when the bytes are not available. Returns `None`
/// for non-internal sources, which pass through untouched.
#[must_use]
pub fn image_replacement(
    src: &str,
    alt: &str,
    title: Option<&str>,
    options: &RenderOptions,
    resource_model: &dyn ResourceModel,
) -> Option<String> {
    let reference = match ResourceReference::parse(src) {
        ReferenceKind::External => return None,
        ReferenceKind::Malformed => {
            return Some(
                "<span class=\"resource-link resource-status-invalid\"></span>".to_owned(),
            );
        }
        ReferenceKind::Internal(reference) => reference,
    };

    let Some(info) = options.resources.get(&reference.item_id).cloned() else {
        // The reference is internal but the map has no entry for it, so
        // the raw `:/id` source must never reach an `<img>` tag.
        return Some(format!(
            "<span class=\"not-loaded-resource resource-status-{}\">{STATUS_ICON_SVG}</span>",
            FetchStatus::Idle.class_name()
        ));
    };
    let status = info.local_state.fetch_status;
    if status != FetchStatus::Done && !options.plain_resource_rendering {
        return Some(format!(
            "<span class=\"not-loaded-resource resource-status-{}\">{STATUS_ICON_SVG}</span>",
            status.class_name()
        ));
    }

    if !resource_model.is_supported_image_mime_type(&info.item.mime) {
        return Some(format!(
            "[Image of type {} cannot be displayed]",
            escape_attr(&info.item.mime)
        ));
    }

    let src = if let Some(handler) = &options.item_id_to_url {
        handler(&reference.item_id, "")
    } else {
        None
    }
    .unwrap_or_else(|| format!("file://{}", resource_model.full_path(&info.item)));

    let title_attr = title.map_or_else(String::new, |t| format!(" title='{}'", escape_attr(t)));
    Some(format!(
        "<img data-from-md data-resource-id='{}' src='{}' alt='{}'{title_attr}/>",
        reference.item_id,
        escape_quotes_in_url(&src),
        escape_attr(alt)
    ))
}

/// Render an embedded player for audio, video and PDF resources, when
/// the corresponding player is enabled. Returns `None` when the resource
/// should stay a plain link.
#[must_use]
pub fn media_player_html(
    reference: &ResourceReference,
    info: &ResourceInfo,
    full_path: &str,
    options: &RenderOptions,
    theme: &Theme,
    embed_counts: &mut HashMap<String, u32>,
) -> Option<String> {
    if options.plain_resource_rendering {
        return None;
    }

    let mime = info.item.mime.to_ascii_lowercase();
    let src = escape_quotes_in_url(&format!("file://{full_path}"));

    if mime.starts_with("audio/") && options.audio_player_enabled {
        return Some(format!(
            "<audio class=\"media-player media-audio\" controls preload=\"none\"><source src='{src}' type='{mime}'></audio>"
        ));
    }

    if mime.starts_with("video/") && options.video_player_enabled {
        return Some(format!(
            "<video class=\"media-player media-video\" controls preload=\"none\"><source src='{src}' type='{mime}'></video>"
        ));
    }

    if mime == "application/pdf" && options.pdf_viewer_enabled {
        if options.use_custom_pdf_viewer {
            // Multiple embeds of the same resource in one document each
            // need a distinct element id.
            let count_key = format!(
                "{}:{}",
                options.note_id.as_deref().unwrap_or(""),
                reference.item_id
            );
            let counter = embed_counts.entry(count_key).or_insert(0);
            *counter += 1;
            let anchor_page = reference
                .hash
                .as_deref()
                .and_then(|h| h.strip_prefix("page="))
                .unwrap_or("1");
            return Some(format!(
                "<iframe id='pdf-{id}-{n}' class=\"media-player media-pdf\" src='pdf-viewer.html?resourceId={id}&pageNo={anchor_page}&appearance={appearance}'></iframe>",
                id = reference.item_id,
                n = *counter,
                appearance = escape_quotes_in_url(&theme.cache_key),
            ));
        }
        return Some(format!(
            "<object data='{src}' class=\"media-player media-pdf\" type=\"application/pdf\"></object>"
        ));
    }

    None
}
