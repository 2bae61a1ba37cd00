//! CDN delivery URL handling
//!
//! Delivery URLs address a stored asset plus a display variant as the last
//! path segment:
//!
//! - `https://cdn.example.com/deliver/<id>/<variant>`
//! - `https://imagedelivery.net/<account>/<id>/<variant>`
//! - `https://example.com/cdn-cgi/imagedelivery/<account>/<id>/<variant>`
//!
//! Stored references are always canonical (no variant) so consumers can append
//! their own variant without stacking two of them.
//!
//! # Example
//!
//! ```rust
//! use motive_core::delivery_url::normalize_delivery_url;
//!
//! let url = "https://cdn.example.com/deliver/abc/public";
//! assert_eq!(normalize_delivery_url(url), "https://cdn.example.com/deliver/abc");
//! ```

use url::{ParseError, Position, Url};

const DELIVER_SEGMENT: &str = "deliver";
const IMAGEDELIVERY_HOST: &str = "imagedelivery.net";

/// Base used to resolve host-relative references such as `/deliver/<id>/<variant>`.
const RELATIVE_BASE: &str = "http://localhost/";

/// A delivery URL split around its asset id.
struct DeliveryUrl {
    url: Url,
    /// Input had no scheme or host; render the path onwards only.
    relative: bool,
    /// Path segments, still percent-encoded, without a trailing empty segment.
    segments: Vec<String>,
    id_index: usize,
}

impl DeliveryUrl {
    fn parse(input: &str) -> Option<Self> {
        let (url, relative) = match Url::parse(input) {
            Ok(url) => (url, false),
            Err(ParseError::RelativeUrlWithoutBase)
                if input.starts_with('/') && !input.starts_with("//") =>
            {
                (Url::parse(RELATIVE_BASE).ok()?.join(input).ok()?, true)
            }
            Err(_) => return None,
        };

        let mut segments: Vec<String> = url.path_segments()?.map(str::to_string).collect();
        if segments.last().is_some_and(|s| s.is_empty()) {
            segments.pop();
        }

        let host = if relative { None } else { url.host_str() };
        let id_index = locate_asset_id(host, &segments)?;
        Some(Self {
            url,
            relative,
            segments,
            id_index,
        })
    }

    fn asset_id(&self) -> &str {
        &self.segments[self.id_index]
    }

    fn variant(&self) -> Option<&str> {
        self.segments.get(self.id_index + 1).map(String::as_str)
    }

    /// Rebuild the URL ending at the asset id, plus `variant` when given.
    /// Query and fragment are carried over.
    fn render(mut self, variant: Option<&str>) -> String {
        let mut path = String::new();
        for segment in self.segments[..=self.id_index].iter().map(String::as_str).chain(variant) {
            path.push('/');
            path.push_str(segment);
        }
        self.url.set_path(&path);

        if self.relative {
            self.url[Position::BeforePath..].to_string()
        } else {
            self.url.to_string()
        }
    }
}

fn is_imagedelivery_host(host: &str) -> bool {
    host == IMAGEDELIVERY_HOST
        || host
            .strip_suffix(IMAGEDELIVERY_HOST)
            .is_some_and(|sub| sub.ends_with('.'))
}

/// Index of the asset id segment, if `segments` form a delivery path.
fn locate_asset_id(host: Option<&str>, segments: &[String]) -> Option<usize> {
    if host.is_some_and(is_imagedelivery_host) {
        // <account>/<id>/<variant>?
        if segments.first().map_or(true, |account| account.is_empty()) {
            return None;
        }
        return bounded_id_index(segments, 1);
    }

    if let Some(k) = segments
        .windows(2)
        .position(|w| w[0] == "cdn-cgi" && w[1] == "imagedelivery")
    {
        // cdn-cgi/imagedelivery/<account>/<id>/<variant>?
        if segments.get(k + 2).map_or(true, |account| account.is_empty()) {
            return None;
        }
        return bounded_id_index(segments, k + 3);
    }

    // .../deliver/<id>/<variant>?, unless the last segment is a file name
    let k = segments.iter().rposition(|s| s == DELIVER_SEGMENT)?;
    if segments[k + 1..].last().is_some_and(|last| last.contains('.')) {
        return None;
    }
    bounded_id_index(segments, k + 1)
}

/// Accepts `id_index` when the id is the last or second-to-last segment and
/// neither it nor the variant is empty.
fn bounded_id_index(segments: &[String], id_index: usize) -> Option<usize> {
    let id = segments.get(id_index)?;
    if id.is_empty() || segments.len() > id_index + 2 {
        return None;
    }
    if segments.get(id_index + 1).is_some_and(|variant| variant.is_empty()) {
        return None;
    }
    Some(id_index)
}

/// Whether `url` has the shape of a CDN delivery URL.
pub fn is_delivery_url(url: &str) -> bool {
    DeliveryUrl::parse(url).is_some()
}

/// Strip the display-variant suffix from a delivery URL.
///
/// Non-delivery URLs and canonical delivery URLs are returned unchanged, so the
/// function is idempotent. Query strings and fragments are kept.
pub fn normalize_delivery_url(url: &str) -> String {
    match DeliveryUrl::parse(url) {
        Some(parsed) if parsed.variant().is_some() => parsed.render(None),
        _ => url.to_string(),
    }
}

/// Asset id segment of a delivery URL.
pub fn extract_asset_id(url: &str) -> Option<String> {
    DeliveryUrl::parse(url).map(|parsed| parsed.asset_id().to_string())
}

/// Display URL for `variant`, replacing any variant already present.
pub fn with_variant(url: &str, variant: &str) -> String {
    let variant = variant.trim_matches('/');
    match DeliveryUrl::parse(url) {
        Some(parsed) if !variant.is_empty() => parsed.render(Some(variant)),
        _ => url.to_string(),
    }
}
