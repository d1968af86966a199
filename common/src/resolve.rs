//! URL resolution for content references.
//!
//! Converts any supported input reference into one concrete, fetchable
//! HTTP(S) URL:
//! - `ipfs://<hash>[/path]` and `.../ipfs/<hash>[/path]` resolve through the
//!   gateway selector, honoring the resolved-gateway cache
//! - plain `http(s)://` URLs pass through unchanged
//! - anything else (including empty input) maps to the local fallback asset
//!
//! Unless disabled, resolved URLs carry image-transform query parameters so
//! the gateway can transcode and resize server-side. Resolution itself never
//! mutates health state; callers record fetch outcomes afterwards.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::health::GatewayHealth;
use crate::select::GatewaySelector;

/// A parsed content reference: the hash plus an optional sub-path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRef {
    pub hash: String,
    pub subpath: Option<String>,
}

impl ContentRef {
    /// Key into the resolved-gateway cache (`hash` or `hash/subpath`).
    pub fn cache_key(&self) -> String {
        match &self.subpath {
            Some(path) => format!("{}/{}", self.hash, path),
            None => self.hash.clone(),
        }
    }
}

/// Extracts `<hash>[/path]` from `ipfs://` URIs and `/ipfs/` gateway URLs.
///
/// The hash is the leading run of ASCII alphanumerics after the marker; an
/// empty run means no reference. A sub-path is kept up to any query string
/// or fragment, with trailing slashes dropped.
pub fn parse_content_ref(src: &str) -> Option<ContentRef> {
    let rest = if let Some(rest) = src.strip_prefix("ipfs://") {
        rest
    } else if let Some(pos) = src.find("/ipfs/") {
        &src[pos + "/ipfs/".len()..]
    } else {
        return None;
    };

    let hash_end = rest
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(rest.len());
    if hash_end == 0 {
        return None;
    }
    let hash = rest[..hash_end].to_string();

    let subpath = rest[hash_end..].strip_prefix('/').and_then(|path| {
        let end = path.find(['?', '#']).unwrap_or(path.len());
        let path = path[..end].trim_end_matches('/');
        (!path.is_empty()).then(|| path.to_string())
    });

    Some(ContentRef { hash, subpath })
}

fn default_transform_enabled() -> bool {
    true
}

fn default_transform_format() -> String {
    "webp".to_string()
}

fn default_transform_width() -> u32 {
    256
}

/// Image-transform query parameters appended to resolved URLs.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransformOptions {
    #[serde(default = "default_transform_enabled")]
    pub enabled: bool,
    #[serde(default = "default_transform_format")]
    pub format: String,
    #[serde(default = "default_transform_width")]
    pub width: u32,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            enabled: default_transform_enabled(),
            format: default_transform_format(),
            width: default_transform_width(),
        }
    }
}

/// Appends `format=<fmt>&width=<w>`, using `&` when the URL already carries
/// a query string and `?` otherwise. Disabled options return the URL
/// unchanged.
pub fn append_transform(url: &str, opts: &TransformOptions) -> String {
    if !opts.enabled {
        return url.to_string();
    }
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{url}{sep}format={}&width={}", opts.format, opts.width)
}

/// Joins a gateway base with a content reference, tolerating bases with or
/// without a trailing slash.
pub fn build_gateway_url(base: &str, content_ref: &ContentRef) -> String {
    let mut url = String::with_capacity(base.len() + content_ref.hash.len() + 16);
    url.push_str(base.trim_end_matches('/'));
    url.push('/');
    url.push_str(&content_ref.hash);
    if let Some(path) = &content_ref.subpath {
        url.push('/');
        url.push_str(path);
    }
    url
}

/// How a resolution was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedVia {
    /// Served from the resolved-gateway cache.
    Cache,
    /// A gateway was picked by the selector.
    Selected,
    /// The input was already a plain HTTP(S) URL.
    Passthrough,
    /// Unresolvable input mapped to the fallback asset.
    Fallback,
}

impl ResolvedVia {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Selected => "selected",
            Self::Passthrough => "passthrough",
            Self::Fallback => "fallback",
        }
    }
}

/// Outcome of a resolution: the URL to fetch plus how it was derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub url: String,
    pub via: ResolvedVia,
}

/// Maps input references to fetchable URLs.
///
/// Output is always a non-empty URL string; unresolvable input degrades to
/// the fallback asset rather than an error.
#[derive(Clone)]
pub struct UrlResolver {
    health: Arc<GatewayHealth>,
    selector: Arc<GatewaySelector>,
    fallback_asset: String,
    transform: TransformOptions,
}

impl UrlResolver {
    pub fn new(
        health: Arc<GatewayHealth>,
        selector: Arc<GatewaySelector>,
        fallback_asset: String,
        transform: TransformOptions,
    ) -> Self {
        Self {
            health,
            selector,
            fallback_asset,
            transform,
        }
    }

    /// Resolves `src` with the configured transform options.
    pub fn resolve(&self, src: &str, now_ms: u64) -> Resolution {
        self.resolve_with(src, &self.transform, now_ms)
    }

    /// Resolves `src` with caller-supplied transform options.
    pub fn resolve_with(&self, src: &str, transform: &TransformOptions, now_ms: u64) -> Resolution {
        let src = src.trim();
        if src.is_empty() {
            return self.fallback();
        }

        if let Some(content_ref) = parse_content_ref(src) {
            let key = content_ref.cache_key();
            if let Some(url) = self.health.cached_url(&key, now_ms) {
                return Resolution {
                    url: append_transform(&url, transform),
                    via: ResolvedVia::Cache,
                };
            }
            if let Some(base) = self.selector.select(&self.health, now_ms) {
                let url = build_gateway_url(&base, &content_ref);
                return Resolution {
                    url: append_transform(&url, transform),
                    via: ResolvedVia::Selected,
                };
            }
            // Total outage with fail-open disabled: serve the placeholder
            return self.fallback();
        }

        if src.starts_with("http://") || src.starts_with("https://") {
            return Resolution {
                url: append_transform(src, transform),
                via: ResolvedVia::Passthrough,
            };
        }

        self.fallback()
    }

    // The fallback asset is a local path, never transformed.
    fn fallback(&self) -> Resolution {
        Resolution {
            url: self.fallback_asset.clone(),
            via: ResolvedVia::Fallback,
        }
    }

    pub fn fallback_asset(&self) -> &str {
        &self.fallback_asset
    }

    pub fn transform(&self) -> &TransformOptions {
        &self.transform
    }
}
