//! Per-origin HTTP client.

use crate::config::ProcessorConfig;
use crate::errors::RequestErrorKind;
use crate::types::HttpHeaders;
use bytes::Bytes;
use http::Method;
use std::fmt;
use url::Url;

/// The `(scheme, host, port)` triple identifying a client pool entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Origin {
    /// URL scheme (`http` or `https`).
    pub scheme: String,
    /// Host name or address.
    pub host: String,
    /// Port, defaulted from the scheme when the URL omits it.
    pub port: u16,
}

impl Origin {
    /// Extract the origin of an absolute URL. `None` for URLs without a
    /// host or a known default port.
    pub fn of(url: &Url) -> Option<Self> {
        let host = url.host_str()?.to_ascii_lowercase();
        let port = url.port_or_known_default()?;
        Some(Self {
            scheme: url.scheme().to_string(),
            host,
            port,
        })
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}

/// A transport-level failure with its taxonomy classification.
#[derive(Debug, Clone)]
pub(crate) struct TransportFailure {
    pub kind: RequestErrorKind,
    pub message: String,
}

/// Long-lived HTTP client for one origin.
///
/// Wraps a `reqwest::Client` configured once from the processor
/// configuration: redirects and automatic decompression are disabled (both
/// are handled by the execution pipeline), connections are kept alive up to
/// the configured idle timeout, and HTTP/2 is negotiated where the server
/// supports it.
#[derive(Clone)]
pub struct OriginClient {
    origin: Origin,
    client: reqwest::Client,
}

impl OriginClient {
    pub(crate) fn new(origin: Origin, config: &ProcessorConfig) -> Result<Self, TransportFailure> {
        // The execution pipeline owns the request deadline; the client-level
        // timeout is a per-exchange safety net on top of it.
        let mut builder = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .pool_idle_timeout(config.connection_idle_timeout)
            .timeout(config.default_timeout);

        if let Some(proxy) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy).map_err(|e| TransportFailure {
                kind: RequestErrorKind::Connect,
                message: format!("invalid proxy configuration: {e}"),
            })?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build().map_err(|e| TransportFailure {
            kind: RequestErrorKind::Connect,
            message: format!("failed to build client for {origin}: {e}"),
        })?;

        Ok(Self { origin, client })
    }

    /// Origin this client is pinned to.
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Issue one HTTP exchange. Redirects are not followed and the body is
    /// not read; the caller owns both.
    pub(crate) async fn execute(
        &self,
        method: Method,
        url: Url,
        headers: &HttpHeaders,
        body: Option<Bytes>,
    ) -> Result<reqwest::Response, TransportFailure> {
        let mut request = self
            .client
            .request(method, url)
            .headers(headers.to_header_map());

        if let Some(bytes) = body {
            request = request.body(bytes);
        }

        request.send().await.map_err(|e| TransportFailure {
            kind: classify(&e),
            message: e.to_string(),
        })
    }
}

/// Map a `reqwest` error onto the request-error taxonomy.
///
/// `reqwest` does not expose DNS and TLS failures as distinct variants, so
/// the error source chain is inspected for the usual markers before falling
/// back to the connect/io split.
pub(crate) fn classify(error: &reqwest::Error) -> RequestErrorKind {
    if error.is_timeout() {
        return RequestErrorKind::Timeout;
    }

    let mut chain = String::new();
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(error);
    while let Some(e) = source {
        chain.push_str(&e.to_string().to_ascii_lowercase());
        chain.push('\n');
        source = e.source();
    }

    if chain.contains("dns") || chain.contains("failed to lookup address") {
        RequestErrorKind::Dns
    } else if chain.contains("certificate") || chain.contains("tls") || chain.contains("handshake")
    {
        RequestErrorKind::Tls
    } else if error.is_connect() {
        RequestErrorKind::Connect
    } else {
        RequestErrorKind::Io
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_of_url() {
        let url = Url::parse("https://API.Example.com/jobs?x=1").unwrap();
        let origin = Origin::of(&url).unwrap();
        assert_eq!(origin.scheme, "https");
        assert_eq!(origin.host, "api.example.com");
        assert_eq!(origin.port, 443);
    }

    #[test]
    fn test_origin_explicit_port() {
        let url = Url::parse("http://localhost:8080/").unwrap();
        let origin = Origin::of(&url).unwrap();
        assert_eq!(origin.port, 8080);
        assert_eq!(origin.to_string(), "http://localhost:8080");
    }

    #[test]
    fn test_distinct_ports_are_distinct_origins() {
        let a = Origin::of(&Url::parse("http://host:80/").unwrap()).unwrap();
        let b = Origin::of(&Url::parse("http://host:8080/").unwrap()).unwrap();
        assert_ne!(a, b);
    }
}
