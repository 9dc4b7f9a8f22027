// API module: contains a small blocking HTTP client that talks to the
// comic metadata service and the image host. It is intentionally small
// and synchronous; every call blocks until it completes or fails.

use anyhow::{Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

/// Metadata document served by the comic service. The service sends more
/// fields than these; unknown fields are ignored, and only `num`, `title`
/// and `alt` ever reach the archive.
#[derive(Debug, Clone, Deserialize)]
pub struct ComicMetadata {
    pub num: u32,
    pub title: String,
    pub img: String,
    pub alt: String,
}

/// Connectivity snapshot taken once at startup and never refreshed.
/// `upper_bound` is the highest comic number known to exist; `None` means
/// the service was unreachable and the bound is unknown.
#[derive(Debug, Clone, Copy)]
pub struct Session {
    pub connected: bool,
    pub upper_bound: Option<u32>,
}

impl Session {
    pub fn offline() -> Self {
        Session {
            connected: false,
            upper_bound: None,
        }
    }
}

/// Blocking HTTP client holding the service base URL and the transport
/// cache directory. The cache layout is private to this client; callers
/// may only ask for it to be cleared.
pub struct ComicClient {
    client: Client,
    base_url: String,
    cache_dir: PathBuf,
}

impl ComicClient {
    /// Create a client configured from the environment variable
    /// `COMIC_BASE_URL` or fallback to the public xkcd service.
    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var("COMIC_BASE_URL").unwrap_or_else(|_| "https://xkcd.com".into());
        Self::new(base_url, crate::data_root().join("http-cache"))
    }

    pub fn new(base_url: String, cache_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&cache_dir).context("Failed to create transport cache directory")?;
        let client = Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        Ok(ComicClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            cache_dir,
        })
    }

    fn latest_url(&self) -> String {
        format!("{}/info.0.json", self.base_url)
    }

    fn comic_url(&self, num: u32) -> String {
        format!("{}/{}/info.0.json", self.base_url, num)
    }

    /// One-shot connectivity check: fetch the latest-comic metadata and
    /// record its number as the session upper bound. Any failure downgrades
    /// the whole session to offline. Never retried.
    pub fn probe(&self) -> Session {
        match self.fetch_latest() {
            Ok(meta) => Session {
                connected: true,
                upper_bound: Some(meta.num),
            },
            Err(err) => {
                log::warn!("connectivity probe failed: {err:#}");
                Session::offline()
            }
        }
    }

    /// Fetch the latest-comic metadata. Always goes over the network:
    /// serving this document from the cache would pin the upper bound to
    /// whatever it was when the cache entry was written.
    pub fn fetch_latest(&self) -> Result<ComicMetadata> {
        let body = self.get_text(&self.latest_url())?;
        parse_metadata(&body)
    }

    /// Fetch the metadata for one comic number, consulting the transport
    /// cache first. Per-number documents never change, so a cached copy is
    /// as good as a fresh one.
    pub fn fetch_metadata(&self, num: u32) -> Result<ComicMetadata> {
        let url = self.comic_url(num);
        let cache_path = self.cache_path(&url);
        if let Ok(body) = fs::read_to_string(&cache_path) {
            if let Ok(meta) = parse_metadata(&body) {
                log::debug!("metadata for comic {num} served from cache");
                return Ok(meta);
            }
        }
        let body = self.get_text(&url)?;
        if let Err(err) = fs::write(&cache_path, &body) {
            log::warn!("failed to cache metadata for comic {num}: {err}");
        }
        parse_metadata(&body)
    }

    /// Download raw image bytes from the URL found in a metadata document.
    pub fn fetch_image(&self, url: &str) -> Result<Vec<u8>> {
        log::info!("downloading {url}");
        let res = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("Failed to GET {url}"))?;
        if !res.status().is_success() {
            anyhow::bail!("Image fetch failed: {} - {}", res.status(), url);
        }
        let bytes = res.bytes().context("Failed to read image body")?;
        Ok(bytes.to_vec())
    }

    fn get_text(&self, url: &str) -> Result<String> {
        let res = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("Failed to GET {url}"))?;
        if !res.status().is_success() {
            anyhow::bail!("Metadata fetch failed: {} - {}", res.status(), url);
        }
        res.text().context("Failed to read response body")
    }

    /// Cache entries are keyed by the request URL, encoded so the key is a
    /// valid filename on every platform.
    fn cache_path(&self, url: &str) -> PathBuf {
        self.cache_dir
            .join(format!("{}.json", URL_SAFE_NO_PAD.encode(url)))
    }

    /// Remove every cache entry. Called on wipe and right before exit.
    pub fn clear_cache(&self) -> Result<()> {
        crate::clear_dir(&self.cache_dir)
    }
}

fn parse_metadata(body: &str) -> Result<ComicMetadata> {
    serde_json::from_str(body).context("Parsing comic metadata json")
}
