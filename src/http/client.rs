//! Pooled upstream HTTP client shared by the forwarder and the health probe.
//!
//! Targets may be plain `http` or `https` endpoints, so the connector
//! speaks both; certificates are checked against the bundled webpki roots.

use axum::body::Body;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

/// Client used for every upstream call.
pub type UpstreamClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Build a client that accepts both `http` and `https` target URLs.
///
/// Upstream connections are always HTTP/1.1.
pub fn upstream_client() -> UpstreamClient {
    let mut http = HttpConnector::new();
    http.enforce_http(false);

    let connector = HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .wrap_connector(http);

    Client::builder(TokioExecutor::new()).build(connector)
}
