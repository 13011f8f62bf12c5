//! Image loading: fetchers, proxy routing, decode, and per-URL load state.

pub(crate) mod cache;
pub(crate) mod decode;
pub(crate) mod source;

pub use cache::{ImageCache, LoadRequest, LoadState, ReadyImage};
pub use decode::{PreparedImage, decode_image};
pub use source::{
    DirFetcher, ImageFetcher, MemoryFetcher, ProxyConfig, encode_uri_component, normalize_rel_path,
};
