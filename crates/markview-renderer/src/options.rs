//! Per-call render options and host-supplied accessors.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::resource::ResourceMap;

/// How internal links are wired up for interaction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkRenderingType {
    /// Clicking is handled by embedded JavaScript in an `onclick` attribute.
    #[default]
    JavaScriptHandler,
    /// Plain `href` link with no JavaScript; the caller intercepts clicks.
    HrefHandler,
}

/// How task-list checkboxes are rendered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckboxRenderingType {
    /// Real `<input type="checkbox">` wired to a click handler that reports
    /// the toggle through the post-message hook.
    #[default]
    CheckboxAndLabel,
    /// Checkbox syntax stripped to plain text, with CSS classes tagging the
    /// list and item. For surfaces where no JavaScript can run.
    CssOnly,
}

/// Hook replacing the resolved URL of an item entirely, used to redirect
/// to externally published URLs. Receives the item id and the URL
/// parameter string (possibly empty); returning `None` means "no URL".
pub type ItemIdToUrlHandler = Arc<dyn Fn(&str, &str) -> Option<String> + Send + Sync>;

/// A user-toggleable setting value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SettingValue {
    /// Boolean toggle.
    Bool(bool),
    /// Integer threshold.
    Int(i64),
    /// Free text.
    Text(String),
}

/// Boundary to the settings/configuration store. Each rule reads its
/// options through an accessor pre-bound to its own plugin id.
pub trait SettingsProvider: Send + Sync {
    /// Read a setting, or `None` when unset.
    fn setting_value(&self, plugin_id: &str, key: &str) -> Option<SettingValue>;
}

/// Settings provider with nothing set.
#[derive(Debug, Default)]
pub struct NullSettings;

impl SettingsProvider for NullSettings {
    fn setting_value(&self, _plugin_id: &str, _key: &str) -> Option<SettingValue> {
        None
    }
}

/// Options for a single render call. Immutable per call.
#[derive(Clone)]
pub struct RenderOptions {
    /// Omit the document wrapper and stylesheet; return the body fragment.
    pub body_only: bool,
    /// Return CSS separately from HTML instead of folding it in.
    pub splitted: bool,
    /// Force all CSS/JS to cache files; nothing stays inline.
    pub external_assets_only: bool,
    /// Name of the host callback used in emitted `onclick`/`ontouch*`
    /// attributes.
    pub post_message_syntax: String,
    /// Swap click-only interaction for a touch-hold gesture.
    pub enable_long_press: bool,
    /// Link interaction wiring.
    pub link_rendering_type: LinkRenderingType,
    /// Export mode: no JavaScript, no status placeholders.
    pub plain_resource_rendering: bool,
    /// Invalidation scope for the code-highlight cache (e.g. the current
    /// note id). `None` clears the cache at the start of every render,
    /// so nothing is reused across renders.
    pub code_highlight_cache_key: Option<String>,
    /// Name of the code color scheme, part of the asset memo key.
    pub code_theme: String,
    /// Maximum content width in pixels; 0 means unconstrained.
    pub content_max_width: u32,
    /// Keywords to wrap in `<mark>` tags (search-result view).
    pub highlighted_keywords: Vec<String>,
    /// Checkbox rendering mode.
    pub checkbox_rendering_type: CheckboxRenderingType,
    /// Render checkboxes disabled (read-only view).
    pub checkbox_disabled: bool,
    /// Render `<audio>` players for audio resources.
    pub audio_player_enabled: bool,
    /// Render `<video>` players for video resources.
    pub video_player_enabled: bool,
    /// Render embedded viewers for PDF resources.
    pub pdf_viewer_enabled: bool,
    /// Use the richer `<iframe>` PDF viewer instead of `<object>`.
    pub use_custom_pdf_viewer: bool,
    /// Id of the note being rendered; disambiguates repeated PDF embeds.
    pub note_id: Option<String>,
    /// `file://` link prefixes the sanitizer lets through.
    pub allowed_file_prefixes: Vec<String>,
    /// Resources referenced by the note, keyed by id.
    pub resources: ResourceMap,
    /// Optional override of the default local-file URL resolution.
    pub item_id_to_url: Option<ItemIdToUrlHandler>,
    /// Settings accessor, pre-bound per rule by the pipeline.
    pub settings: Arc<dyn SettingsProvider>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            body_only: false,
            splitted: false,
            external_assets_only: false,
            post_message_syntax: "postMessage".to_owned(),
            enable_long_press: false,
            link_rendering_type: LinkRenderingType::default(),
            plain_resource_rendering: false,
            code_highlight_cache_key: None,
            code_theme: "atom-one-light".to_owned(),
            content_max_width: 0,
            highlighted_keywords: Vec::new(),
            checkbox_rendering_type: CheckboxRenderingType::default(),
            checkbox_disabled: false,
            audio_player_enabled: true,
            video_player_enabled: true,
            pdf_viewer_enabled: true,
            use_custom_pdf_viewer: false,
            note_id: None,
            allowed_file_prefixes: Vec::new(),
            resources: ResourceMap::new(),
            item_id_to_url: None,
            settings: Arc::new(NullSettings),
        }
    }
}

impl RenderOptions {
    /// Deterministic serialization of every field that influences output,
    /// used as cache-key material. Function-valued fields contribute only
    /// their presence; the settings accessor is covered by the pipeline's
    /// plugin-options state, which is part of pipeline identity rather
    /// than call identity.
    pub(crate) fn cache_key_material(&self) -> String {
        let value = serde_json::json!({
            "bodyOnly": self.body_only,
            "splitted": self.splitted,
            "externalAssetsOnly": self.external_assets_only,
            "postMessageSyntax": self.post_message_syntax,
            "enableLongPress": self.enable_long_press,
            "linkRenderingType": self.link_rendering_type,
            "plainResourceRendering": self.plain_resource_rendering,
            "codeHighlightCacheKey": self.code_highlight_cache_key,
            "codeTheme": self.code_theme,
            "contentMaxWidth": self.content_max_width,
            "highlightedKeywords": self.highlighted_keywords,
            "checkboxRenderingType": self.checkbox_rendering_type,
            "checkboxDisabled": self.checkbox_disabled,
            "audioPlayerEnabled": self.audio_player_enabled,
            "videoPlayerEnabled": self.video_player_enabled,
            "pdfViewerEnabled": self.pdf_viewer_enabled,
            "useCustomPdfViewer": self.use_custom_pdf_viewer,
            "noteId": self.note_id,
            "allowedFilePrefixes": self.allowed_file_prefixes,
            "resources": self.resources,
            "hasItemIdToUrl": self.item_id_to_url.is_some(),
        });
        value.to_string()
    }
}
