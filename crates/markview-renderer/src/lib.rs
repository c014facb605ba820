//! Note body rendering to sanitized, embeddable HTML.
//!
//! This crate turns markdown or HTML note bodies into HTML suitable for
//! injection into a script-isolated view. Internal item references
//! (`:/32hexid` or `joplin://32hexid`) are resolved against a
//! caller-supplied resource map; raw HTML is always sanitized; user
//! interaction is wired to a host messaging function rather than
//! application code.
//!
//! [`MarkupToHtml`] is the front door: it routes each call to the
//! pipeline for the note's markup language and keeps their caches warm
//! across calls. Markdown rendering is extensible through
//! [`rules::RenderRule`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use markview_renderer::{
//!     MarkupLanguage, MarkupToHtml, NullFsDriver, RenderOptions, Theme,
//! };
//! use markview_renderer::resource::FsResourceModel;
//!
//! let renderer = MarkupToHtml::new(
//!     Arc::new(FsResourceModel::new("/resources")),
//!     Arc::new(NullFsDriver),
//! );
//! let options = RenderOptions {
//!     body_only: true,
//!     ..RenderOptions::default()
//! };
//! let result = renderer
//!     .render(MarkupLanguage::Markdown, "# (r) and (c)", &Theme::default(), &options)
//!     .unwrap();
//! assert_eq!(result.html, "<h1 id=\"r-and-c\">(r) and (c)</h1>");
//! ```

mod assets;
mod error;
mod event_attrs;
mod fs_driver;
pub mod html;
mod html_pipeline;
mod md_pipeline;
mod options;
pub mod resolver;
pub mod resource;
pub mod rules;
mod router;
mod sanitize;
mod theme;

pub use assets::{PluginAsset, RenderResult, RenderResultPluginAsset};
pub use error::RenderError;
pub use event_attrs::event_handling_attrs;
pub use fs_driver::{DirFsDriver, FsDriver, NullFsDriver};
pub use html_pipeline::HtmlToHtml;
pub use md_pipeline::MdToHtml;
pub use options::{
    CheckboxRenderingType, ItemIdToUrlHandler, LinkRenderingType, NullSettings, RenderOptions,
    SettingValue, SettingsProvider,
};
pub use router::{MarkupLanguage, MarkupToHtml};
pub use sanitize::{HtmlSanitizer, SanitizeOptions};
pub use theme::{Theme, note_style};
