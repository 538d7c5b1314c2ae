use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::BaseDirs;

const CACHE_SUBDIR: &str = "img";

/// Thumbnails cached as `<dir>/<uid>.png`.
#[derive(Debug, Clone, Default)]
pub struct ThumbnailCache {
    dir: Option<PathBuf>,
}

impl ThumbnailCache {
    /// The per-user cache for `app_name`. Without a home directory there is no
    /// cache and every lookup misses.
    pub fn for_app(app_name: &str) -> Self {
        let dir = BaseDirs::new().map(|base| base.cache_dir().join(app_name).join(CACHE_SUBDIR));
        Self { dir }
    }

    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn cached_image_path(&self, uid: &str) -> Option<PathBuf> {
        if uid.is_empty() || uid.contains(['/', '\\']) || uid.starts_with('.') {
            return None;
        }
        self.dir.as_ref().map(|dir| dir.join(format!("{uid}.png")))
    }

    pub fn load(&self, uid: &str) -> Result<Option<Vec<u8>>> {
        let Some(path) = self.cached_image_path(uid) else {
            return Ok(None);
        };
        if path.exists() {
            let data = fs::read(&path)
                .with_context(|| format!("failed to read thumbnail {}", path.display()))?;
            Ok(Some(data))
        } else {
            Ok(None)
        }
    }
}
