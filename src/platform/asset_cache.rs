// SPDX-License-Identifier: GPL-3.0-only
use reqwest::Client;
use reqwest::header::CACHE_CONTROL;
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, info};
use url::Url;

use crate::error::PlatformError;
use crate::utils::cache_file_name;

/// On-disk cache of precached application assets.
pub struct AssetCache {
    client: Client,
    dir: PathBuf,
}

impl AssetCache {
    pub fn new(client: Client, dir: PathBuf) -> Self {
        Self { client, dir }
    }

    pub fn path_for(&self, url: &Url) -> Option<PathBuf> {
        cache_file_name(url.path()).ok().map(|name| self.dir.join(name))
    }

    /// Fetch `url` bypassing HTTP caches and replace the cached copy atomically.
    pub async fn store(&self, url: &Url) -> Result<PathBuf, PlatformError> {
        let target = self
            .path_for(url)
            .ok_or_else(|| PlatformError::InvalidManifest(format!("unsafe asset path: {}", url.path())))?;

        debug!(url = %url, "Fetching asset for cache");
        let response = self
            .client
            .get(url.clone())
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await?
            .error_for_status()?;
        let body = response.bytes().await?;

        tokio::fs::create_dir_all(&self.dir).await?;

        let dir = self.dir.clone();
        let path = target.clone();
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
            tmp.write_all(&body)?;
            tmp.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(std::io::Error::other)??;

        info!(url = %url, path = %target.display(), "Asset cached");
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_store_writes_asset() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/assets/app.js")
            .match_header("cache-control", "no-cache")
            .with_status(200)
            .with_body("console.log('meals')")
            .create_async()
            .await;
        let dir = TempDir::new().unwrap();
        let cache = AssetCache::new(Client::new(), dir.path().join("cache"));

        let url = Url::parse(&format!("{}/assets/app.js", server.url())).unwrap();
        let path = cache.store(&url).await.unwrap();

        assert_eq!(path, dir.path().join("cache").join("assets__app.js"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "console.log('meals')");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_store_replaces_previous_copy() {
        let mut server = mockito::Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let cache = AssetCache::new(Client::new(), dir.path().to_path_buf());
        let url = Url::parse(&format!("{}/index.html", server.url())).unwrap();

        let first = server.mock("GET", "/index.html").with_body("v1").create_async().await;
        cache.store(&url).await.unwrap();
        first.remove_async().await;

        server.mock("GET", "/index.html").with_body("v2").create_async().await;
        let path = cache.store(&url).await.unwrap();

        assert_eq!(std::fs::read_to_string(path).unwrap(), "v2");
    }

    #[tokio::test]
    async fn test_store_http_error() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/missing.css").with_status(404).create_async().await;
        let dir = TempDir::new().unwrap();
        let cache = AssetCache::new(Client::new(), dir.path().to_path_buf());

        let url = Url::parse(&format!("{}/missing.css", server.url())).unwrap();
        let result = cache.store(&url).await;

        assert!(matches!(result, Err(PlatformError::Network(_))));
    }
}
