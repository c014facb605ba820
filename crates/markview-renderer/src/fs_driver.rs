//! Host filesystem access used when CSS must be shipped as files
//! instead of inline `<style>` blocks.

use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::assets::RenderResultPluginAsset;
use crate::error::RenderError;

/// Filesystem operations the host environment provides.
///
/// Only needed for renders requesting `external_assets_only`; all other
/// paths never touch the filesystem.
pub trait FsDriver: Send + Sync {
    /// Write `content` to `path`, creating parent directories as needed.
    fn write_file(&self, path: &Path, content: &str) -> Result<(), RenderError>;

    /// Whether `path` already exists.
    fn exists(&self, path: &Path) -> bool;

    /// Persist `css` to a content-addressed file and describe it as a
    /// plugin asset. Already-written content is not rewritten.
    fn cache_css_to_file(&self, css: &str) -> Result<RenderResultPluginAsset, RenderError>;
}

/// Driver used when the host provided none. Every operation fails with
/// [`RenderError::FsDriverNotSet`].
#[derive(Debug, Default)]
pub struct NullFsDriver;

impl FsDriver for NullFsDriver {
    fn write_file(&self, _path: &Path, _content: &str) -> Result<(), RenderError> {
        Err(RenderError::FsDriverNotSet("write_file"))
    }

    fn exists(&self, _path: &Path) -> bool {
        false
    }

    fn cache_css_to_file(&self, _css: &str) -> Result<RenderResultPluginAsset, RenderError> {
        Err(RenderError::FsDriverNotSet("cache_css_to_file"))
    }
}

/// Driver writing into a fixed cache directory.
#[derive(Debug)]
pub struct DirFsDriver {
    base_dir: PathBuf,
}

impl DirFsDriver {
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }
}

impl FsDriver for DirFsDriver {
    fn write_file(&self, path: &Path, content: &str) -> Result<(), RenderError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| RenderError::AssetWrite {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, content).map_err(|source| RenderError::AssetWrite {
            path: path.to_path_buf(),
            source,
        })
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn cache_css_to_file(&self, css: &str) -> Result<RenderResultPluginAsset, RenderError> {
        let mut hasher = Sha256::new();
        hasher.update(css.as_bytes());
        let name = format!("{}.css", hex::encode(hasher.finalize()));
        let path = self.base_dir.join(&name);
        if !self.exists(&path) {
            self.write_file(&path, css)?;
        }
        Ok(RenderResultPluginAsset {
            source: "css-cache".to_owned(),
            name: name.clone(),
            path: path.to_string_lossy().into_owned(),
            mime: "text/css".to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_null_driver_fails() {
        let driver = NullFsDriver;
        let err = driver.cache_css_to_file("body {}").unwrap_err();
        assert!(matches!(err, RenderError::FsDriverNotSet("cache_css_to_file")));
    }

    #[test]
    fn test_dir_driver_writes_content_addressed_css() {
        let dir = tempfile::tempdir().unwrap();
        let driver = DirFsDriver::new(dir.path());

        let asset = driver.cache_css_to_file("body { color: red; }").unwrap();
        assert_eq!(asset.mime, "text/css");
        assert!(asset.name.ends_with(".css"));
        let written = fs::read_to_string(&asset.path).unwrap();
        assert_eq!(written, "body { color: red; }");

        // Same content maps to the same file.
        let again = driver.cache_css_to_file("body { color: red; }").unwrap();
        assert_eq!(again.path, asset.path);
    }
}
