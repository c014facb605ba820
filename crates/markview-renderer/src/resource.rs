//! Resource (attachment) model and internal reference parsing.
//!
//! Notes reference locally-stored attachments through a reserved scheme:
//! `joplin://<32-hex-id>` or the short form `:/<32-hex-id>`, optionally
//! followed by `#fragment`. The storage layer itself is out of scope; it is
//! consumed through the [`ResourceModel`] trait.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Readiness of a resource's bytes on the local device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    /// Download has not been requested yet.
    Idle,
    /// Download in progress.
    Started,
    /// Bytes are available locally.
    Done,
    /// Download failed.
    Error,
}

impl FetchStatus {
    /// CSS class suffix used on status placeholders.
    #[must_use]
    pub fn class_name(self) -> &'static str {
        match self {
            Self::Idle => "notDownloaded",
            Self::Started => "downloading",
            Self::Done => "ready",
            Self::Error => "error",
        }
    }
}

/// Stored attachment metadata, as supplied by the resource provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourceItem {
    /// 32-hex-char stable identifier.
    pub id: String,
    /// User-facing title.
    pub title: String,
    /// MIME type of the stored bytes.
    pub mime: String,
    /// File extension without the dot, possibly empty.
    #[serde(default)]
    pub file_extension: String,
}

/// Device-local state of a resource.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocalState {
    /// Readiness of the bytes.
    pub fetch_status: FetchStatus,
}

/// A resource item together with its local state, keyed by id in
/// [`RenderOptions::resources`](crate::RenderOptions).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourceInfo {
    /// Attachment metadata.
    pub item: ResourceItem,
    /// Local readiness state.
    pub local_state: LocalState,
}

/// Map of resource id to resource info. Ordered so cache keys derived from
/// it are deterministic.
pub type ResourceMap = BTreeMap<String, ResourceInfo>;

/// A parsed internal reference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceReference {
    /// Referenced item id (32 hex chars).
    pub item_id: String,
    /// Optional `#fragment` (page anchor, heading slug).
    pub hash: Option<String>,
}

/// Classification of a reference string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReferenceKind {
    /// Not an internal reference; leave the link alone.
    External,
    /// Matches the internal scheme but the id is not a well-formed
    /// 32-hex identifier. Rendered as a broken-link placeholder.
    Malformed,
    /// Well-formed internal reference.
    Internal(ResourceReference),
}

static REFERENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:joplin://|:/)([^#\s]*)(?:#(.*))?$").expect("valid regex"));

static ITEM_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-fA-F]{32}$").expect("valid regex"));

/// Whether `id` is a well-formed 32-hex item identifier.
#[must_use]
pub fn is_item_id(id: &str) -> bool {
    ITEM_ID_RE.is_match(id)
}

impl ResourceReference {
    /// Classify a reference string.
    ///
    /// # Example
    ///
    /// ```
    /// use markview_renderer::resource::{ReferenceKind, ResourceReference};
    ///
    /// let id = "0123456789abcdef0123456789abcdef";
    /// match ResourceReference::parse(&format!(":/{id}#page=2")) {
    ///     ReferenceKind::Internal(r) => {
    ///         assert_eq!(r.item_id, id);
    ///         assert_eq!(r.hash.as_deref(), Some("page=2"));
    ///     }
    ///     _ => unreachable!(),
    /// }
    /// ```
    #[must_use]
    pub fn parse(reference: &str) -> ReferenceKind {
        let Some(caps) = REFERENCE_RE.captures(reference) else {
            return ReferenceKind::External;
        };
        let id = &caps[1];
        if !is_item_id(id) {
            return ReferenceKind::Malformed;
        }
        ReferenceKind::Internal(Self {
            item_id: id.to_ascii_lowercase(),
            hash: caps.get(2).map(|m| m.as_str().to_owned()),
        })
    }
}

/// Boundary to the note/attachment storage layer.
pub trait ResourceModel: Send + Sync {
    /// Whether `url` is an internal resource reference.
    fn is_resource_url(&self, url: &str) -> bool {
        !matches!(ResourceReference::parse(url), ReferenceKind::External)
    }

    /// Extract the item id from an internal reference, if well-formed.
    fn url_to_id(&self, url: &str) -> Option<String> {
        match ResourceReference::parse(url) {
            ReferenceKind::Internal(r) => Some(r.item_id),
            _ => None,
        }
    }

    /// On-disk file name of a resource.
    fn filename(&self, item: &ResourceItem) -> String {
        if item.file_extension.is_empty() {
            item.id.clone()
        } else {
            format!("{}.{}", item.id, item.file_extension)
        }
    }

    /// Absolute local path (or URL) of a resource's bytes.
    fn full_path(&self, item: &ResourceItem) -> String;

    /// Whether the given MIME type can be shown in an `<img>` tag.
    fn is_supported_image_mime_type(&self, mime: &str) -> bool {
        matches!(
            mime.to_ascii_lowercase().as_str(),
            "image/png" | "image/jpg" | "image/jpeg" | "image/gif" | "image/svg+xml"
                | "image/webp" | "image/avif"
        )
    }
}

/// Resource model resolving bytes under a base directory, named
/// `<id>.<ext>` the way the storage layer lays files out.
pub struct FsResourceModel {
    base_dir: PathBuf,
}

impl FsResourceModel {
    /// Create a model rooted at `base_dir`.
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }
}

impl ResourceModel for FsResourceModel {
    fn full_path(&self, item: &ResourceItem) -> String {
        self.base_dir.join(self.filename(item)).display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ID: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_parse_long_scheme() {
        let parsed = ResourceReference::parse(&format!("joplin://{ID}"));
        assert_eq!(
            parsed,
            ReferenceKind::Internal(ResourceReference {
                item_id: ID.to_owned(),
                hash: None,
            })
        );
    }

    #[test]
    fn test_parse_short_scheme_with_hash() {
        let parsed = ResourceReference::parse(&format!(":/{ID}#section-2"));
        assert_eq!(
            parsed,
            ReferenceKind::Internal(ResourceReference {
                item_id: ID.to_owned(),
                hash: Some("section-2".to_owned()),
            })
        );
    }

    #[test]
    fn test_parse_uppercase_id_normalized() {
        let parsed = ResourceReference::parse(&format!(":/{}", ID.to_uppercase()));
        match parsed {
            ReferenceKind::Internal(r) => assert_eq!(r.item_id, ID),
            other => panic!("expected internal reference, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_wrong_length_is_malformed() {
        assert_eq!(
            ResourceReference::parse(":/abcdef123456"),
            ReferenceKind::Malformed
        );
        assert_eq!(
            ResourceReference::parse("joplin://nothexnothexnothexnothexnothexno"),
            ReferenceKind::Malformed
        );
    }

    #[test]
    fn test_parse_external() {
        assert_eq!(
            ResourceReference::parse("https://example.com"),
            ReferenceKind::External
        );
        assert_eq!(ResourceReference::parse("#anchor"), ReferenceKind::External);
    }

    #[test]
    fn test_fs_model_full_path() {
        let model = FsResourceModel::new("/res");
        let item = ResourceItem {
            id: ID.to_owned(),
            title: "photo".to_owned(),
            mime: "image/png".to_owned(),
            file_extension: "png".to_owned(),
        };
        assert_eq!(model.full_path(&item), format!("/res/{ID}.png"));
        assert!(model.is_supported_image_mime_type("image/PNG"));
        assert!(!model.is_supported_image_mime_type("application/pdf"));
    }
}
