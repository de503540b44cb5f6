//! Client key derivation - which identity a request is counted against.

use actix_web::HttpRequest;

use ratewise_core::RateLimitKey;

/// Header set by reverse proxies with the originating client chain.
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Derives the rate limit key for a request.
pub trait ClientKeyExtractor: Send + Sync {
    /// `None` when the request carries nothing to identify the caller.
    fn extract(&self, req: &HttpRequest) -> Option<RateLimitKey>;

    /// Key the request is counted against. Unidentified callers all land in
    /// [`RateLimitKey::unknown`].
    fn key_for(&self, req: &HttpRequest) -> RateLimitKey {
        self.extract(req).unwrap_or_else(RateLimitKey::unknown)
    }
}

/// Keys clients by the socket peer IP address.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeerIpKeyExtractor;

impl ClientKeyExtractor for PeerIpKeyExtractor {
    fn extract(&self, req: &HttpRequest) -> Option<RateLimitKey> {
        let addr = req.peer_addr()?;
        RateLimitKey::new(addr.ip().to_string()).ok()
    }
}

/// Keys clients by the first `X-Forwarded-For` entry, falling back to the
/// peer IP when the header is missing or empty.
///
/// The header is client-controlled unless a trusted proxy overwrites it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForwardedForKeyExtractor;

impl ClientKeyExtractor for ForwardedForKeyExtractor {
    fn extract(&self, req: &HttpRequest) -> Option<RateLimitKey> {
        let forwarded = req
            .headers()
            .get(FORWARDED_FOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty());

        match forwarded {
            Some(ip) => RateLimitKey::new(ip).ok(),
            None => PeerIpKeyExtractor.extract(req),
        }
    }
}
