//! Generated asset directory.
//!
//! # Data Flow
//! ```text
//! compiled site.css / component script
//!     → content hash
//!     → compare with file on disk (rewrite only on change)
//!     → write tmp file + rename (readers never see a torn file)
//!     → AssetRef { url?ver=hash }
//! ```
//!
//! # Design Decisions
//! - Freshness is decided by content, not modification time
//! - The directory is created on demand and may be deleted at any time

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::AssetsConfig;

/// A published asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRef {
    /// Public URL without the version query.
    pub url: String,
    /// Short content hash.
    pub version: String,
}

impl AssetRef {
    /// URL with a `?ver=` cache buster.
    pub fn versioned_url(&self) -> String {
        format!("{}?ver={}", self.url, self.version)
    }
}

/// Filesystem directory paired with the URL prefix it is served under.
#[derive(Debug, Clone)]
pub struct AssetDir {
    dir: PathBuf,
    url_prefix: String,
}

impl AssetDir {
    pub fn new(dir: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        let url_prefix = url_prefix.into();
        Self {
            dir: dir.into(),
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &AssetsConfig) -> Self {
        Self::new(config.dir.clone(), config.url_prefix.as_str())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn url_prefix(&self) -> &str {
        &self.url_prefix
    }

    pub fn url_for(&self, relative: &str) -> String {
        format!("{}/{}", self.url_prefix, relative.trim_start_matches('/'))
    }

    /// Write `content` to `relative` unless the file already holds it.
    pub fn write_if_changed(&self, relative: &str, content: &[u8]) -> io::Result<AssetRef> {
        let relative = relative.trim_start_matches('/');
        if relative.is_empty() || relative.split(['/', '\\']).any(|s| s == "..") {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid asset path '{}'", relative),
            ));
        }

        let path = self.dir.join(relative);
        let asset = AssetRef {
            url: self.url_for(relative),
            version: content_hash(content),
        };

        match fs::read(&path) {
            Ok(existing) if existing == content => {
                tracing::trace!(path = %path.display(), "Asset unchanged");
                return Ok(asset);
            }
            _ => {}
        }

        write_atomic(&path, content)?;
        tracing::debug!(path = %path.display(), version = %asset.version, "Asset written");
        Ok(asset)
    }

    /// Remove every generated file. Missing directory is not an error.
    pub fn purge(&self) -> io::Result<()> {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Short content hash used for `?ver=` query strings.
pub fn content_hash(content: &[u8]) -> String {
    let digest = Sha256::digest(content);
    hex::encode(&digest[..8])
}

/// Write through a uniquely named sibling file, then rename into place.
pub fn write_atomic(path: &Path, content: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));

    fs::write(&tmp, content)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}
