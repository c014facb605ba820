//! Plugin asset handling and final result assembly.
//!
//! Rendering rules declare the stylesheets and scripts their output
//! depends on as [`PluginAsset`]s. After the body is rendered those are
//! deduplicated and split into inline CSS (folded into the output) and
//! file-backed assets (returned to the host for loading).

use std::collections::HashSet;

use crate::error::RenderError;
use crate::fs_driver::FsDriver;
use crate::options::RenderOptions;
use crate::theme::{Theme, note_style};

/// An asset a rule ships with its output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PluginAsset {
    /// File name relative to the rule's asset directory, empty for
    /// inline assets.
    pub name: String,
    /// Media type. Optional for named assets (derived from the
    /// extension), required for inline ones.
    pub mime: Option<String>,
    /// Inline content, if the asset is not file-backed.
    pub inline: Option<String>,
    /// Inline text for pure-text assets (treated as CSS).
    pub text: Option<String>,
}

impl PluginAsset {
    /// A file-backed asset identified by name.
    #[must_use]
    pub fn file(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            mime: None,
            inline: None,
            text: None,
        }
    }

    /// An inline asset carrying its content directly.
    #[must_use]
    pub fn inline(mime: &str, content: &str) -> Self {
        Self {
            name: String::new(),
            mime: Some(mime.to_owned()),
            inline: Some(content.to_owned()),
            text: None,
        }
    }
}

/// A fully resolved asset handed back to the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderResultPluginAsset {
    /// Rule that contributed the asset.
    pub source: String,
    pub name: String,
    /// Path the host loads the asset from.
    pub path: String,
    pub mime: String,
}

/// Output of one render.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderResult {
    pub html: String,
    /// Inline CSS accumulated during the render. Already folded into
    /// `html` unless the caller asked for externalized assets.
    pub css_strings: Vec<String>,
    pub plugin_assets: Vec<RenderResultPluginAsset>,
}

fn mime_from_name(name: &str) -> String {
    let ext = name.rsplit('.').next().unwrap_or("");
    match ext.to_ascii_lowercase().as_str() {
        "css" => "text/css".to_owned(),
        "js" => "application/javascript".to_owned(),
        _ => "application/octet-stream".to_owned(),
    }
}

/// Partition the declared assets of the used rules into inline CSS and
/// file-backed assets, deduplicating by `(source, name)`.
pub fn process_plugin_assets(
    assets: &[(String, PluginAsset)],
    asset_base_path: &str,
) -> Result<(Vec<String>, Vec<RenderResultPluginAsset>), RenderError> {
    let mut css_strings = Vec::new();
    let mut resolved = Vec::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();

    for (source, asset) in assets {
        let inline_content = asset.inline.as_deref().or(asset.text.as_deref());

        if let Some(content) = inline_content {
            if asset.name.is_empty() {
                let Some(mime) = &asset.mime else {
                    return Err(RenderError::MissingAssetMime {
                        rule: source.clone(),
                        name: asset.name.clone(),
                    });
                };
                if mime != "text/css" {
                    return Err(RenderError::UnsupportedInlineMime(mime.clone()));
                }
                css_strings.push(content.to_owned());
                continue;
            }
        }

        if !seen.insert((source.clone(), asset.name.clone())) {
            continue;
        }

        let mime = asset
            .mime
            .clone()
            .unwrap_or_else(|| mime_from_name(&asset.name));
        resolved.push(RenderResultPluginAsset {
            source: source.clone(),
            name: asset.name.clone(),
            path: format!("{asset_base_path}/{source}/{}", asset.name),
            mime,
        });
    }

    Ok((css_strings, resolved))
}

/// Assemble the final [`RenderResult`] from the rendered body.
///
/// Unless the caller asked for the bare body, the output is wrapped in
/// the `#rendered-md` container and the collected CSS is emitted as a
/// leading `<style>` block. With `external_assets_only` the CSS is
/// instead flushed to a file through the driver and returned as a
/// plugin asset.
pub fn finalize_render(
    body: String,
    mut css_strings: Vec<String>,
    mut plugin_assets: Vec<RenderResultPluginAsset>,
    theme: &Theme,
    options: &RenderOptions,
    fs_driver: &dyn FsDriver,
) -> Result<RenderResult, RenderError> {
    let mut base_css = note_style(theme, options.content_max_width);
    base_css.append(&mut css_strings);
    let css_strings = base_css;

    // Externalization is orthogonal to the body/splitted shape of the
    // output, so the flush happens before the wrapping branch.
    if options.external_assets_only {
        let css = css_strings.join("\n");
        if !css.trim().is_empty() {
            plugin_assets.push(fs_driver.cache_css_to_file(&css)?);
        }
    }

    let html = if options.body_only {
        body
    } else if options.splitted || options.external_assets_only {
        format!("<div id=\"rendered-md\">{body}</div>")
    } else {
        format!(
            "<style>{}</style>\n<div id=\"rendered-md\">{body}</div>",
            css_strings.join("\n")
        )
    };

    Ok(RenderResult {
        html,
        css_strings,
        plugin_assets,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn named(source: &str, name: &str) -> (String, PluginAsset) {
        (source.to_owned(), PluginAsset::file(name))
    }

    #[test]
    fn test_inline_css_collected() {
        let assets = vec![(
            "fence".to_owned(),
            PluginAsset::inline("text/css", ".hljs { color: red; }"),
        )];
        let (css, resolved) = process_plugin_assets(&assets, "/assets").unwrap();
        assert_eq!(css, vec![".hljs { color: red; }".to_owned()]);
        assert!(resolved.is_empty());
    }

    #[test]
    fn test_inline_without_mime_rejected() {
        let assets = vec![(
            "fence".to_owned(),
            PluginAsset {
                name: String::new(),
                mime: None,
                inline: Some("x".to_owned()),
                text: None,
            },
        )];
        let err = process_plugin_assets(&assets, "/assets").unwrap_err();
        assert!(matches!(err, RenderError::MissingAssetMime { .. }));
    }

    #[test]
    fn test_inline_non_css_rejected() {
        let assets = vec![(
            "fence".to_owned(),
            PluginAsset::inline("application/javascript", "alert(1)"),
        )];
        let err = process_plugin_assets(&assets, "/assets").unwrap_err();
        assert!(matches!(err, RenderError::UnsupportedInlineMime(_)));
    }

    #[test]
    fn test_named_assets_deduped_and_typed() {
        let assets = vec![
            named("katex", "katex.css"),
            named("katex", "katex.js"),
            named("katex", "katex.css"),
            named("katex", "fonts/KaTeX_Main.woff2"),
        ];
        let (css, resolved) = process_plugin_assets(&assets, "/assets").unwrap();
        assert!(css.is_empty());
        assert_eq!(resolved.len(), 3);
        assert_eq!(resolved[0].mime, "text/css");
        assert_eq!(resolved[0].path, "/assets/katex/katex.css");
        assert_eq!(resolved[1].mime, "application/javascript");
        assert_eq!(resolved[2].mime, "application/octet-stream");
    }

    #[test]
    fn test_finalize_wraps_and_inlines_css() {
        let options = RenderOptions::default();
        let result = finalize_render(
            "<p>hi</p>".to_owned(),
            vec![".x { color: blue; }".to_owned()],
            Vec::new(),
            &Theme::default(),
            &options,
            &crate::fs_driver::NullFsDriver,
        )
        .unwrap();
        assert!(result.html.starts_with("<style>"));
        assert!(result.html.contains(".x { color: blue; }"));
        assert!(result.html.ends_with("<div id=\"rendered-md\"><p>hi</p></div>"));
    }

    #[test]
    fn test_finalize_body_only() {
        let options = RenderOptions {
            body_only: true,
            ..RenderOptions::default()
        };
        let result = finalize_render(
            "<p>hi</p>".to_owned(),
            Vec::new(),
            Vec::new(),
            &Theme::default(),
            &options,
            &crate::fs_driver::NullFsDriver,
        )
        .unwrap();
        assert_eq!(result.html, "<p>hi</p>");
        // CSS is still reported so a host can apply it separately.
        assert!(!result.css_strings.is_empty());
    }

    #[test]
    fn test_finalize_splitted_external_assets_still_flushed() {
        let dir = tempfile::tempdir().unwrap();
        let driver = crate::fs_driver::DirFsDriver::new(dir.path());
        let options = RenderOptions {
            splitted: true,
            external_assets_only: true,
            ..RenderOptions::default()
        };
        let result = finalize_render(
            "<p>hi</p>".to_owned(),
            vec![".x {}".to_owned()],
            Vec::new(),
            &Theme::default(),
            &options,
            &driver,
        )
        .unwrap();
        assert!(!result.html.contains("<style>"));
        assert_eq!(result.plugin_assets.len(), 1);
        assert_eq!(result.plugin_assets[0].mime, "text/css");
    }

    #[test]
    fn test_finalize_external_assets() {
        let dir = tempfile::tempdir().unwrap();
        let driver = crate::fs_driver::DirFsDriver::new(dir.path());
        let options = RenderOptions {
            external_assets_only: true,
            ..RenderOptions::default()
        };
        let result = finalize_render(
            "<p>hi</p>".to_owned(),
            vec![".x {}".to_owned()],
            Vec::new(),
            &Theme::default(),
            &options,
            &driver,
        )
        .unwrap();
        assert!(!result.html.contains("<style>"));
        assert_eq!(result.plugin_assets.len(), 1);
        assert_eq!(result.plugin_assets[0].mime, "text/css");
    }
}
