//! Request body capture and replay.
//!
//! # Responsibilities
//! - Read the inbound body exactly once, enforcing a size limit
//! - Hand out the same bytes to every forward attempt
//! - Decompress gzip bodies for targets that do not accept compression
//!
//! # Design Decisions
//! - The original bytes are never replaced: a reroute from a target without
//!   compression support to one with it still sends the compressed body
//! - Decompression happens at most once per request and is cached
//! - A body that fails to decompress is forwarded unchanged

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap};
use flate2::read::GzDecoder;
use futures_util::StreamExt;
use std::io::Read;
use std::sync::OnceLock;

use crate::resilience::error::FailoverError;

/// Read `body` fully, failing once more than `limit` bytes arrive.
pub async fn capture(body: Body, limit: usize) -> Result<Bytes, FailoverError> {
    let mut stream = body.into_data_stream();
    let mut buf: Vec<u8> = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| FailoverError::BodyRead(e.to_string()))?;
        if buf.len() + chunk.len() > limit {
            return Err(FailoverError::BodyTooLarge { limit });
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(Bytes::from(buf))
}

/// Body bytes prepared for one particular target.
#[derive(Debug, Clone)]
pub struct PreparedBody {
    pub bytes: Bytes,
    /// True when gzip was stripped; `Content-Encoding` must be dropped.
    pub decompressed: bool,
}

/// Capture-once, replay-many request body.
#[derive(Debug)]
pub struct ReplayBody {
    original: Bytes,
    gzip: bool,
    decoded: OnceLock<Option<Bytes>>,
}

impl ReplayBody {
    pub fn new(original: Bytes, headers: &HeaderMap) -> Self {
        let gzip = headers
            .get(header::CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("gzip"));

        Self {
            original,
            gzip,
            decoded: OnceLock::new(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Bytes::new(), &HeaderMap::new())
    }

    pub fn original(&self) -> &Bytes {
        &self.original
    }

    pub fn len(&self) -> usize {
        self.original.len()
    }

    pub fn is_empty(&self) -> bool {
        self.original.is_empty()
    }

    pub fn is_gzip(&self) -> bool {
        self.gzip
    }

    /// Bytes to send to a target, given whether it accepts compressed bodies.
    pub fn for_target(&self, compression: bool) -> PreparedBody {
        if !self.gzip || compression || self.original.is_empty() {
            return self.passthrough();
        }

        match self.decoded.get_or_init(|| gunzip(&self.original)) {
            Some(bytes) => PreparedBody {
                bytes: bytes.clone(),
                decompressed: true,
            },
            None => self.passthrough(),
        }
    }

    fn passthrough(&self) -> PreparedBody {
        PreparedBody {
            bytes: self.original.clone(),
            decompressed: false,
        }
    }
}

fn gunzip(data: &[u8]) -> Option<Bytes> {
    let mut out = Vec::new();
    match GzDecoder::new(data).read_to_end(&mut out) {
        Ok(_) => Some(Bytes::from(out)),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to decompress gzip body, forwarding as-is");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use flate2::{write::GzEncoder, Compression};
    use std::io::Write;

    const PAYLOAD: &[u8] = br#"{"jsonrpc":"2.0","method":"eth_chainId","params":[],"id":7}"#;

    fn gzip_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        headers
    }

    fn gzipped(data: &[u8]) -> Bytes {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        Bytes::from(encoder.finish().unwrap())
    }

    #[tokio::test]
    async fn capture_reads_whole_body() {
        let bytes = capture(Body::from(PAYLOAD), 1024).await.unwrap();
        assert_eq!(&bytes[..], PAYLOAD);
    }

    #[tokio::test]
    async fn capture_enforces_limit() {
        let result = capture(Body::from(vec![0u8; 2048]), 1024).await;
        assert!(matches!(result, Err(FailoverError::BodyTooLarge { limit: 1024 })));
    }

    #[test]
    fn replays_identical_bytes() {
        let body = ReplayBody::new(Bytes::from_static(PAYLOAD), &HeaderMap::new());
        for _ in 0..3 {
            let prepared = body.for_target(false);
            assert_eq!(&prepared.bytes[..], PAYLOAD);
            assert!(!prepared.decompressed);
        }
    }

    #[test]
    fn gzip_decompressed_only_for_targets_without_compression() {
        let compressed = gzipped(PAYLOAD);
        let body = ReplayBody::new(compressed.clone(), &gzip_headers());
        assert!(body.is_gzip());

        let plain = body.for_target(false);
        assert!(plain.decompressed);
        assert_eq!(&plain.bytes[..], PAYLOAD);

        // A later reroute to a compression-capable target still sees the original.
        let original = body.for_target(true);
        assert!(!original.decompressed);
        assert_eq!(original.bytes, compressed);
    }

    #[test]
    fn corrupt_gzip_is_forwarded_unchanged() {
        let body = ReplayBody::new(Bytes::from_static(b"definitely not gzip"), &gzip_headers());
        let prepared = body.for_target(false);
        assert!(!prepared.decompressed);
        assert_eq!(&prepared.bytes[..], b"definitely not gzip");
    }
}
