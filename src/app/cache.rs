use std::fs;
use std::future::Future;
use std::io::Write;
use std::path::PathBuf;

use tempfile::Builder;

use tracing::{debug, info, warn};

use super::error::{Result, ViewerError};
use super::fetch::ByteSource;

/// Local store for strip images, addressed by the image URL.
pub trait ImageCache {
    fn get_or_fetch(&self, url: &str) -> impl Future<Output = Result<PathBuf>> + Send;
}

/// Keeps one file per image name under `dir`. A name that is already on disk
/// is trusted as-is: no hash check, no freshness check.
#[derive(Debug, Clone)]
pub struct DiskCache<S> {
    dir: PathBuf,
    source: S,
}

impl<S> DiskCache<S> {
    pub fn new(dir: impl Into<PathBuf>, source: S) -> Self {
        Self {
            dir: dir.into(),
            source,
        }
    }
}

impl<S: ByteSource + Sync> ImageCache for DiskCache<S> {
    async fn get_or_fetch(&self, url: &str) -> Result<PathBuf> {
        let result = self.load(url).await;
        if let Err(err) = &result {
            warn!(url, "error downloading image: {err}");
        }
        result
    }
}

impl<S: ByteSource + Sync> DiskCache<S> {
    async fn load(&self, url: &str) -> Result<PathBuf> {
        let name = image_file_name(url).ok_or_else(|| ViewerError::NoFileName {
            url: url.to_string(),
        })?;
        let path = self.dir.join(name);
        if path.exists() {
            debug!(path = %path.display(), "image cache hit");
            return Ok(path);
        }

        let bytes = self.source.fetch_bytes(url).await?;
        fs::create_dir_all(&self.dir).map_err(|source| ViewerError::CacheWrite {
            path: self.dir.clone(),
            source,
        })?;
        // Written under a temporary name and renamed, so a file at `path` is
        // always complete.
        let mut part = Builder::new()
            .prefix(".")
            .suffix(".part")
            .tempfile_in(&self.dir)
            .map_err(|source| ViewerError::CacheWrite {
                path: self.dir.clone(),
                source,
            })?;
        part.write_all(&bytes).map_err(|source| ViewerError::CacheWrite {
            path: part.path().to_path_buf(),
            source,
        })?;
        part.persist(&path).map_err(|err| ViewerError::CacheWrite {
            path: path.clone(),
            source: err.error,
        })?;
        info!(path = %path.display(), bytes = bytes.len(), "cached strip image");
        Ok(path)
    }
}

/// Last path segment of `url` with any query string removed.
pub fn image_file_name(url: &str) -> Option<&str> {
    let last = url.rsplit('/').next()?;
    let name = last.split('?').next().unwrap_or_default();
    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingSource {
        calls: AtomicUsize,
        urls: Mutex<Vec<String>>,
        fail: bool,
    }

    impl ByteSource for CountingSource {
        async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.urls.lock().unwrap().push(url.to_string());
            if self.fail {
                return Err(ViewerError::HttpStatus {
                    url: url.to_string(),
                    status: 500,
                });
            }
            Ok(b"GIF89a-strip".to_vec())
        }
    }

    #[test]
    fn file_name_strips_query() {
        assert_eq!(
            image_file_name("https://assets.amuniversal.com/abc123?width=900"),
            Some("abc123")
        );
        assert_eq!(
            image_file_name("https://featureassets.gocomics.com/x/strip.png"),
            Some("strip.png")
        );
        assert_eq!(image_file_name("https://example.com/dir/"), None);
        assert_eq!(image_file_name("https://example.com/dir/?q=1"), None);
    }

    #[tokio::test]
    async fn second_fetch_hits_the_cache() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(tmp.path().join("downloaded_comics"), CountingSource::default());
        let url = "https://assets.amuniversal.com/0a1b2c?w=900";

        let first = cache.get_or_fetch(url).await.unwrap();
        let second = cache.get_or_fetch(url).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first, tmp.path().join("downloaded_comics").join("0a1b2c"));
        assert_eq!(cache.source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fs::read(&first).unwrap(), b"GIF89a-strip");
    }

    #[tokio::test]
    async fn existing_file_is_reused_without_network() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("strip.png"), b"already here").unwrap();
        let cache = DiskCache::new(tmp.path(), CountingSource::default());

        let path = cache
            .get_or_fetch("https://featureassets.gocomics.com/other/strip.png")
            .await
            .unwrap();

        assert_eq!(path, tmp.path().join("strip.png"));
        assert_eq!(cache.source.calls.load(Ordering::SeqCst), 0);
        assert_eq!(fs::read(path).unwrap(), b"already here");
    }

    #[tokio::test]
    async fn failed_download_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("cache");
        let cache = DiskCache::new(
            &dir,
            CountingSource {
                fail: true,
                ..CountingSource::default()
            },
        );

        let err = cache
            .get_or_fetch("https://assets.amuniversal.com/missing")
            .await
            .unwrap_err();

        assert!(matches!(err, ViewerError::HttpStatus { status: 500, .. }));
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn url_without_file_name_is_rejected_before_fetching() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(tmp.path(), CountingSource::default());

        let err = cache
            .get_or_fetch("https://assets.amuniversal.com/")
            .await
            .unwrap_err();

        assert!(matches!(err, ViewerError::NoFileName { .. }));
        assert!(cache.source.urls.lock().unwrap().is_empty());
    }

    fn entries(dir: &std::path::Path) -> Vec<String> {
        let mut names = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        names.sort();
        names
    }

    #[tokio::test]
    async fn download_leaves_only_the_finished_file() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(tmp.path(), CountingSource::default());

        cache
            .get_or_fetch("https://assets.amuniversal.com/0a1b2c")
            .await
            .unwrap();

        assert_eq!(entries(tmp.path()), vec!["0a1b2c".to_string()]);
    }

    #[tokio::test]
    async fn interrupted_write_is_not_a_cache_hit() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join(".0a1b2cXYZ123.part"), b"GIF8").unwrap();
        let cache = DiskCache::new(tmp.path(), CountingSource::default());

        let path = cache
            .get_or_fetch("https://assets.amuniversal.com/0a1b2c")
            .await
            .unwrap();

        assert_eq!(cache.source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fs::read(path).unwrap(), b"GIF89a-strip");
        assert_eq!(
            entries(tmp.path()),
            vec![".0a1b2cXYZ123.part".to_string(), "0a1b2c".to_string()]
        );
    }
}
