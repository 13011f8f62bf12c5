use std::collections::{BTreeSet, HashMap};

use crate::assets::decode::decode_image;
use crate::assets::source::{ImageFetcher, ProxyConfig};
use crate::foundation::error::MoodboardResult;

/// One fetch the host should perform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadRequest {
    /// URL as stored in the scene.
    pub source_url: String,
    /// URL to actually fetch (proxied or direct).
    pub fetch_url: String,
    pub via_proxy: bool,
}

/// Decoded image ready to draw.
#[derive(Clone, Debug)]
pub struct ReadyImage {
    pub width: u32,
    pub height: u32,
    pub paint: vello_cpu::Image,
}

#[derive(Clone, Debug)]
pub enum LoadState {
    Pending,
    Ready(ReadyImage),
    Failed,
}

#[derive(Clone, Debug)]
struct Entry {
    state: LoadState,
    request: LoadRequest,
    requested: bool,
}

/// Per-URL load state for every image the current scene references.
///
/// Loads are never cancelled. A result arriving for a URL the scene no longer references is
/// dropped, and a failed image stays blank instead of erroring.
#[derive(Debug, Default)]
pub struct ImageCache {
    proxy: ProxyConfig,
    entries: HashMap<String, Entry>,
}

impl ImageCache {
    pub fn new(proxy: ProxyConfig) -> Self {
        Self {
            proxy,
            entries: HashMap::new(),
        }
    }

    /// Track exactly `urls`: new ones become pending, unreferenced ones are forgotten.
    pub fn sync(&mut self, urls: &BTreeSet<String>) {
        self.entries.retain(|url, _| urls.contains(url));
        for url in urls {
            if !self.entries.contains_key(url) {
                let (fetch_url, via_proxy) = self.proxy.route(url);
                tracing::debug!(url = %url, via_proxy, "image load queued");
                self.entries.insert(
                    url.clone(),
                    Entry {
                        state: LoadState::Pending,
                        request: LoadRequest {
                            source_url: url.clone(),
                            fetch_url,
                            via_proxy,
                        },
                        requested: false,
                    },
                );
            }
        }
    }

    pub fn state(&self, url: &str) -> Option<&LoadState> {
        self.entries.get(url).map(|e| &e.state)
    }

    pub fn ready(&self, url: &str) -> Option<&ReadyImage> {
        match self.state(url) {
            Some(LoadState::Ready(img)) => Some(img),
            _ => None,
        }
    }

    pub fn has_pending(&self) -> bool {
        self.entries
            .values()
            .any(|e| matches!(e.state, LoadState::Pending))
    }

    /// Requests not yet handed out. Each request is returned once.
    pub fn take_pending_loads(&mut self) -> Vec<LoadRequest> {
        let mut out: Vec<LoadRequest> = self
            .entries
            .values_mut()
            .filter(|e| matches!(e.state, LoadState::Pending) && !e.requested)
            .map(|e| {
                e.requested = true;
                e.request.clone()
            })
            .collect();
        out.sort_by(|a, b| a.source_url.cmp(&b.source_url));
        out
    }

    /// Apply a fetch result. Returns `true` when an image became drawable.
    ///
    /// A failed proxied fetch is retried once against the original URL through the next
    /// [`ImageCache::take_pending_loads`].
    pub fn deliver(&mut self, request: &LoadRequest, result: MoodboardResult<Vec<u8>>) -> bool {
        let Some(entry) = self.entries.get_mut(&request.source_url) else {
            tracing::warn!(url = %request.source_url, "discarding load for unreferenced image");
            return false;
        };
        if entry.request != *request || !matches!(entry.state, LoadState::Pending) {
            tracing::debug!(url = %request.source_url, "discarding stale load result");
            return false;
        }

        let decoded = result.and_then(|bytes| {
            let prepared = decode_image(&bytes)?;
            let paint = prepared.to_paint()?;
            Ok(ReadyImage {
                width: prepared.width,
                height: prepared.height,
                paint,
            })
        });

        match decoded {
            Ok(img) => {
                tracing::debug!(
                    url = %request.source_url,
                    width = img.width,
                    height = img.height,
                    "image ready"
                );
                entry.state = LoadState::Ready(img);
                true
            }
            Err(e) if request.via_proxy => {
                tracing::warn!(
                    url = %request.source_url,
                    error = %e,
                    "proxied image load failed, retrying original url"
                );
                entry.request = LoadRequest {
                    source_url: request.source_url.clone(),
                    fetch_url: request.source_url.clone(),
                    via_proxy: false,
                };
                entry.requested = false;
                false
            }
            Err(e) => {
                tracing::warn!(url = %request.source_url, error = %e, "image load failed");
                entry.state = LoadState::Failed;
                false
            }
        }
    }

    /// Drain every pending request through `fetcher`, including proxy fallbacks.
    pub fn pump(&mut self, fetcher: &dyn ImageFetcher) -> bool {
        let mut changed = false;
        loop {
            let requests = self.take_pending_loads();
            if requests.is_empty() {
                return changed;
            }
            for req in requests {
                let result = fetcher.fetch(&req.fetch_url);
                changed |= self.deliver(&req, result);
            }
        }
    }
}
