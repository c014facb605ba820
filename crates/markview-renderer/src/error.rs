//! Renderer error types.
//!
//! Bad note content never produces an error: malformed references, invalid
//! math and unbalanced HTML all degrade to placeholders inside the output.
//! [`RenderError`] covers the remaining cases: rule misconfiguration and
//! environment failures.

use std::path::PathBuf;

/// Error returned by render pipelines and registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// A rule with this key is already registered. Rules are add-only and
    /// keyed by a unique string id.
    #[error("a renderer rule with this key has already been registered: {0}")]
    DuplicateRule(String),

    /// An inline asset was declared without a MIME type. This is a rule
    /// misconfiguration, not a content problem.
    #[error("mime type is required for inline assets (rule: {rule}, asset: {name})")]
    MissingAssetMime {
        /// Key of the rule declaring the asset.
        rule: String,
        /// Asset name.
        name: String,
    },

    /// Only CSS may be inlined; anything else must be an external file.
    #[error("unsupported inline mime type: {0}")]
    UnsupportedInlineMime(String),

    /// A file-system driver operation was invoked but no driver was
    /// configured on the pipeline.
    #[error("file system driver not set: {0}")]
    FsDriverNotSet(&'static str),

    /// Writing a generated asset file failed.
    #[error("failed to write asset file {}: {source}", .path.display())]
    AssetWrite {
        /// Target path of the failed write.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Other I/O error from the injected file driver.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
