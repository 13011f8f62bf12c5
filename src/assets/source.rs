use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::foundation::error::{MoodboardError, MoodboardResult};

/// Supplies raw image bytes for a URL.
///
/// Hosts implement this over their network stack; the crate ships a directory-backed and an
/// in-memory fetcher.
pub trait ImageFetcher {
    fn fetch(&self, url: &str) -> MoodboardResult<Vec<u8>>;
}

/// How cross-origin sources reach the image proxy.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Proxy path or URL; the source goes in its `url` query parameter.
    pub endpoint: String,
    /// URL prefixes that are same-origin and fetched directly.
    pub local_prefixes: Vec<String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            endpoint: "/proxy".to_owned(),
            local_prefixes: Vec::new(),
        }
    }
}

impl ProxyConfig {
    /// Embedded, relative and same-origin references are fetched as-is.
    pub fn is_local(&self, url: &str) -> bool {
        let lower = url.trim_start().to_ascii_lowercase();
        if lower.starts_with("data:") || lower.starts_with("blob:") {
            return true;
        }
        if self
            .local_prefixes
            .iter()
            .any(|p| !p.is_empty() && url.starts_with(p.as_str()))
        {
            return true;
        }
        !lower.contains("://") && !lower.starts_with("//")
    }

    /// Proxied form of `url`. Deterministic: the same source always yields the same string.
    pub fn proxy_url(&self, url: &str) -> String {
        let sep = if self.endpoint.contains('?') { '&' } else { '?' };
        format!("{}{sep}url={}", self.endpoint, encode_uri_component(url))
    }

    /// URL to request first for `url`, and whether it went through the proxy.
    pub fn route(&self, url: &str) -> (String, bool) {
        if self.is_local(url) {
            (url.to_owned(), false)
        } else {
            (self.proxy_url(url), true)
        }
    }
}

/// Percent-encode everything except the unreserved set used by URI components.
pub fn encode_uri_component(s: &str) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = String::with_capacity(s.len());
    for &b in s.as_bytes() {
        let keep = b.is_ascii_alphanumeric()
            || matches!(b, b'-' | b'_' | b'.' | b'!' | b'~' | b'*' | b'\'' | b'(' | b')');
        if keep {
            out.push(char::from(b));
        } else {
            out.push('%');
            out.push(char::from(HEX[usize::from(b >> 4)]));
            out.push(char::from(HEX[usize::from(b & 0x0f)]));
        }
    }
    out
}

pub fn normalize_rel_path(source: &str) -> MoodboardResult<String> {
    let s = source.replace('\\', "/");
    if s.starts_with('/') {
        return Err(MoodboardError::validation("asset paths must be relative"));
    }
    if s.contains("://") {
        return Err(MoodboardError::validation(
            "asset paths must not carry a scheme",
        ));
    }
    if s.is_empty() {
        return Err(MoodboardError::validation("asset path must be non-empty"));
    }

    let mut out = Vec::<&str>::new();
    for part in s.split('/') {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." {
            return Err(MoodboardError::validation(
                "asset paths must not contain '..'",
            ));
        }
        out.push(part);
    }

    if out.is_empty() {
        return Err(MoodboardError::validation(
            "asset path must contain a file name",
        ));
    }

    Ok(out.join("/"))
}

/// Serves relative URLs from a directory on disk.
#[derive(Clone, Debug)]
pub struct DirFetcher {
    root: PathBuf,
}

impl DirFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ImageFetcher for DirFetcher {
    fn fetch(&self, url: &str) -> MoodboardResult<Vec<u8>> {
        let norm = normalize_rel_path(url).map_err(|e| MoodboardError::load(e.to_string()))?;
        let path = self.root.join(Path::new(&norm));
        std::fs::read(&path)
            .with_context(|| format!("read image bytes from '{}'", path.display()))
            .map_err(|e| MoodboardError::load(format!("{e:#}")))
    }
}

/// Preloaded bytes keyed by the exact URL that will be requested.
#[derive(Clone, Debug, Default)]
pub struct MemoryFetcher {
    images: HashMap<String, Vec<u8>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, url: impl Into<String>, bytes: Vec<u8>) {
        self.images.insert(url.into(), bytes);
    }

    #[must_use]
    pub fn with(mut self, url: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.insert(url, bytes);
        self
    }
}

impl ImageFetcher for MemoryFetcher {
    fn fetch(&self, url: &str) -> MoodboardResult<Vec<u8>> {
        self.images
            .get(url)
            .cloned()
            .ok_or_else(|| MoodboardError::load(format!("no image registered for '{url}'")))
    }
}
