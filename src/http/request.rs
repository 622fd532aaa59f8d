//! Request handling and transformation.
//!
//! # Responsibilities
//! - Generate unique request ID (UUID v4)
//! - Keep the inbound request head for replay across attempts
//! - Prepare a fresh outbound request for every forward attempt
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Hop-by-hop and length headers are dropped; the replayed body defines length
//! - Original request head preserved; each attempt gets its own copy

use axum::body::Body;
use axum::http::{
    header, request::Parts, HeaderMap, HeaderName, HeaderValue, Method, Request, Uri, Version,
};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use crate::http::body::PreparedBody;
use crate::http::context::AttemptContext;

/// Header carrying the request ID.
pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Headers that apply to a single connection and must not be forwarded.
pub const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Generates a UUID v4 request ID when the client did not send one.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Remove hop-by-hop headers in place.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
}

/// The inbound request head, kept so every attempt can be rebuilt from it.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
    pub headers: HeaderMap,
}

impl InboundRequest {
    pub fn from_parts(parts: &Parts) -> Self {
        Self {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            version: parts.version,
            headers: parts.headers.clone(),
        }
    }

    pub fn request_id(&self) -> Option<&str> {
        self.headers
            .get(&X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
    }

    /// Build the outbound request for one attempt.
    ///
    /// The URI is still the inbound one; the forwarder rewrites it for the
    /// chosen target. The upstream hop is always HTTP/1.1, whatever the
    /// client spoke to us.
    pub fn build_attempt(&self, body: PreparedBody, attempt: AttemptContext) -> Request<Body> {
        let mut headers = self.headers.clone();
        strip_hop_by_hop(&mut headers);
        headers.remove(header::CONTENT_LENGTH);
        headers.remove(header::HOST);
        if body.decompressed {
            headers.remove(header::CONTENT_ENCODING);
        }

        let mut request = Request::new(Body::from(body.bytes));
        *request.method_mut() = self.method.clone();
        *request.uri_mut() = self.uri.clone();
        *request.version_mut() = Version::HTTP_11;
        *request.headers_mut() = headers;
        request.extensions_mut().insert(attempt);
        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::context::{retries_from, target_name_from};
    use axum::body::Bytes;

    fn inbound() -> InboundRequest {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/rpc?x=1")
            .header(header::HOST, "proxy.local")
            .header(header::CONNECTION, "keep-alive")
            .header(header::CONTENT_LENGTH, "99")
            .header(header::CONTENT_ENCODING, "gzip")
            .header(&X_REQUEST_ID, "req-1")
            .header("x-custom", "kept")
            .body(Body::empty())
            .unwrap();
        let (parts, _) = request.into_parts();
        InboundRequest::from_parts(&parts)
    }

    #[test]
    fn attempt_copies_head_and_strips_connection_headers() {
        let inbound = inbound();
        assert_eq!(inbound.request_id(), Some("req-1"));

        let attempt = AttemptContext {
            reroutes: 0,
            retries: 2,
            target_name: "alpha".into(),
        };
        let body = PreparedBody {
            bytes: Bytes::from_static(b"{}"),
            decompressed: true,
        };
        let request = inbound.build_attempt(body, attempt);

        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.uri(), "/rpc?x=1");
        let headers = request.headers();
        assert!(headers.get(header::CONNECTION).is_none());
        assert!(headers.get(header::CONTENT_LENGTH).is_none());
        assert!(headers.get(header::HOST).is_none());
        assert!(headers.get(header::CONTENT_ENCODING).is_none());
        assert_eq!(headers.get("x-custom").unwrap(), "kept");
        assert_eq!(headers.get(&X_REQUEST_ID).unwrap(), "req-1");
        assert_eq!(retries_from(&request), 2);
        assert_eq!(target_name_from(&request), "alpha");
    }

    #[test]
    fn http2_inbound_goes_upstream_as_http11() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/")
            .version(Version::HTTP_2)
            .body(())
            .unwrap();
        let (parts, _) = request.into_parts();
        let inbound = InboundRequest::from_parts(&parts);
        assert_eq!(inbound.version, Version::HTTP_2);

        let body = PreparedBody {
            bytes: Bytes::from_static(b"{}"),
            decompressed: false,
        };
        let attempt = inbound.build_attempt(body, AttemptContext::default());
        assert_eq!(attempt.version(), Version::HTTP_11);
    }

    #[test]
    fn content_encoding_kept_when_not_decompressed() {
        let body = PreparedBody {
            bytes: Bytes::new(),
            decompressed: false,
        };
        let request = inbound().build_attempt(body, AttemptContext::default());
        assert_eq!(request.headers().get(header::CONTENT_ENCODING).unwrap(), "gzip");
    }

    #[test]
    fn request_ids_are_unique() {
        let mut maker = UuidRequestId;
        let request = Request::new(Body::empty());
        let a = maker.make_request_id(&request).unwrap();
        let b = maker.make_request_id(&request).unwrap();
        assert_ne!(a.header_value(), b.header_value());
    }
}
