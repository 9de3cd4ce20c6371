//! Outbound request value and template.

use crate::errors::RequestBuildError;
use crate::types::headers::HttpHeaders;
use crate::types::payload::Payload;
use http::Method;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Default template timeout when none is configured.
pub const DEFAULT_TEMPLATE_TIMEOUT: Duration = Duration::from_secs(30);

/// An immutable outbound HTTP request.
///
/// Built through [`RequestBuilder`] (or a [`RequestTemplate`]); the built
/// value is never mutated, so it can be shared freely across threads and
/// serialized for hand-off to external systems.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    #[serde(with = "method_str")]
    method: Method,
    url: Url,
    #[serde(default)]
    headers: HttpHeaders,
    #[serde(default)]
    body: Option<Payload>,
    #[serde(default, with = "opt_duration_secs")]
    timeout: Option<Duration>,
    #[serde(default)]
    max_redirects: Option<u32>,
    #[serde(default)]
    raise_error_responses: Option<bool>,
}

impl Request {
    /// Start building a request.
    pub fn builder(method: Method, url: impl AsRef<str>) -> RequestBuilder {
        RequestBuilder::new(method, url.as_ref())
    }

    /// Convenience GET builder.
    pub fn get(url: impl AsRef<str>) -> RequestBuilder {
        Self::builder(Method::GET, url)
    }

    /// Convenience POST builder.
    pub fn post(url: impl AsRef<str>) -> RequestBuilder {
        Self::builder(Method::POST, url)
    }

    /// Request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Absolute request URL, query included.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Request headers.
    pub fn headers(&self) -> &HttpHeaders {
        &self.headers
    }

    /// Request body, if any.
    pub fn body(&self) -> Option<&Payload> {
        self.body.as_ref()
    }

    /// Overall request timeout, if set.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Redirect cap, if set.
    pub fn max_redirects(&self) -> Option<u32> {
        self.max_redirects
    }

    /// Per-task override for treating 4xx/5xx as errors.
    pub fn raise_error_responses(&self) -> Option<bool> {
        self.raise_error_responses
    }
}

/// Builder for [`Request`].
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    method: Method,
    url: String,
    base_url: Option<Url>,
    headers: HttpHeaders,
    default_headers: HttpHeaders,
    default_params: Vec<(String, String)>,
    body: Option<Payload>,
    json_body: bool,
    timeout: Option<Duration>,
    default_timeout: Option<Duration>,
    max_redirects: Option<u32>,
    raise_error_responses: Option<bool>,
}

impl RequestBuilder {
    fn new(method: Method, url: &str) -> Self {
        Self {
            method,
            url: url.to_string(),
            base_url: None,
            headers: HttpHeaders::new(),
            default_headers: HttpHeaders::new(),
            default_params: Vec::new(),
            body: None,
            json_body: false,
            timeout: None,
            default_timeout: None,
            max_redirects: None,
            raise_error_responses: None,
        }
    }

    /// Set a header, replacing existing values under the same name.
    pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set the raw request body.
    pub fn body(mut self, body: impl Into<Payload>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set a JSON request body. `content-type` defaults to
    /// `application/json; encoding=utf-8` unless explicitly set.
    pub fn json<T: Serialize>(mut self, value: &T) -> Result<Self, RequestBuildError> {
        let bytes = serde_json::to_vec(value)?;
        self.body = Some(Payload::inline(bytes));
        self.json_body = true;
        Ok(self)
    }

    /// Set the overall request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Cap the number of redirects followed.
    pub fn max_redirects(mut self, max: u32) -> Self {
        self.max_redirects = Some(max);
        self
    }

    /// Treat 4xx/5xx responses as errors for this request.
    pub fn raise_error_responses(mut self, raise: bool) -> Self {
        self.raise_error_responses = Some(raise);
        self
    }

    pub(crate) fn with_template(
        mut self,
        base_url: Option<Url>,
        headers: HttpHeaders,
        params: Vec<(String, String)>,
        timeout: Duration,
    ) -> Self {
        self.base_url = base_url;
        self.default_headers = headers;
        self.default_params = params;
        self.default_timeout = Some(timeout);
        self
    }

    /// Validate and freeze the request.
    pub fn build(self) -> Result<Request, RequestBuildError> {
        match self.method {
            Method::GET | Method::POST | Method::PUT | Method::PATCH | Method::DELETE => {}
            other => {
                return Err(RequestBuildError::UnsupportedMethod {
                    method: other.to_string(),
                })
            }
        }

        let mut url = match Url::parse(&self.url) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => match &self.base_url {
                Some(base) => base.join(&self.url)?,
                None => {
                    return Err(RequestBuildError::RelativeUrl { url: self.url })
                }
            },
            Err(e) => return Err(e.into()),
        };

        if !self.default_params.is_empty() {
            let existing: Vec<String> =
                url.query_pairs().map(|(name, _)| name.into_owned()).collect();
            let mut pairs = url.query_pairs_mut();
            for (name, value) in &self.default_params {
                if !existing.contains(name) {
                    pairs.append_pair(name, value);
                }
            }
            drop(pairs);
        }

        // Empty bodies are normalized to absent before the method check so a
        // GET built with an empty string body is still valid.
        let body = self.body.filter(|b| !b.is_empty());
        if body.is_some() && matches!(self.method, Method::GET | Method::DELETE) {
            return Err(RequestBuildError::BodyNotAllowed {
                method: self.method.to_string(),
            });
        }

        let mut headers = self.headers;
        headers.merge_defaults(&self.default_headers);
        if self.json_body && body.is_some() && !headers.contains("content-type") {
            headers.insert("content-type", "application/json; encoding=utf-8");
        }

        Ok(Request {
            method: self.method,
            url,
            headers,
            body,
            timeout: self.timeout.or(self.default_timeout),
            max_redirects: self.max_redirects,
            raise_error_responses: self.raise_error_responses,
        })
    }
}

/// Immutable defaults applied to requests built through it.
///
/// Resolves relative URLs against `base_url`, merges default headers under
/// per-request headers, appends default params to the query, and defaults
/// the timeout.
#[derive(Debug, Clone)]
pub struct RequestTemplate {
    base_url: Option<Url>,
    headers: HttpHeaders,
    params: Vec<(String, String)>,
    timeout: Duration,
}

impl Default for RequestTemplate {
    fn default() -> Self {
        Self {
            base_url: None,
            headers: HttpHeaders::new(),
            params: Vec::new(),
            timeout: DEFAULT_TEMPLATE_TIMEOUT,
        }
    }
}

impl RequestTemplate {
    /// Create an empty template.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base URL relative request URLs resolve against.
    pub fn with_base_url(mut self, base_url: impl AsRef<str>) -> Result<Self, RequestBuildError> {
        self.base_url = Some(Url::parse(base_url.as_ref())?);
        Ok(self)
    }

    /// Add a default header.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Add a default query parameter.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    /// Set the default timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Start building a request with this template's defaults.
    pub fn request(&self, method: Method, url: impl AsRef<str>) -> RequestBuilder {
        RequestBuilder::new(method, url.as_ref()).with_template(
            self.base_url.clone(),
            self.headers.clone(),
            self.params.clone(),
            self.timeout,
        )
    }
}

mod method_str {
    use http::Method;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(method: &Method, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(method.as_str())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Method, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

mod opt_duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&d.as_secs_f64()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        let secs = Option::<f64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs_f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_with_body_rejected() {
        let err = Request::get("https://example.com/")
            .body("data")
            .build()
            .unwrap_err();
        assert!(matches!(err, RequestBuildError::BodyNotAllowed { .. }));
    }

    #[test]
    fn test_empty_body_normalized_to_absent() {
        let request = Request::get("https://example.com/").body("").build().unwrap();
        assert!(request.body().is_none());
    }

    #[test]
    fn test_json_body_sets_content_type() {
        let request = Request::post("https://example.com/jobs")
            .json(&serde_json::json!({"id": 1}))
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(
            request.headers().get("content-type"),
            Some("application/json; encoding=utf-8")
        );
    }

    #[test]
    fn test_explicit_content_type_wins_over_json_default() {
        let request = Request::post("https://example.com/jobs")
            .header("Content-Type", "application/vnd.custom+json")
            .json(&serde_json::json!({"id": 1}))
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(
            request.headers().get("content-type"),
            Some("application/vnd.custom+json")
        );
    }

    #[test]
    fn test_unsupported_method_rejected() {
        let err = Request::builder(Method::HEAD, "https://example.com/")
            .build()
            .unwrap_err();
        assert!(matches!(err, RequestBuildError::UnsupportedMethod { .. }));
    }

    #[test]
    fn test_relative_url_without_base_rejected() {
        let err = Request::get("/jobs").build().unwrap_err();
        assert!(matches!(err, RequestBuildError::RelativeUrl { .. }));
    }

    #[test]
    fn test_template_resolves_and_merges() {
        let template = RequestTemplate::new()
            .with_base_url("https://api.example.com/v1/")
            .unwrap()
            .with_header("accept", "application/json")
            .with_header("x-env", "prod")
            .with_param("team", "infra")
            .with_timeout(Duration::from_secs(10));

        let request = template
            .request(Method::GET, "jobs?page=2")
            .header("x-env", "staging")
            .build()
            .unwrap();

        assert_eq!(request.url().as_str(), "https://api.example.com/v1/jobs?page=2&team=infra");
        assert_eq!(request.headers().get("accept"), Some("application/json"));
        assert_eq!(request.headers().get("x-env"), Some("staging"));
        assert_eq!(request.timeout(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_template_params_do_not_clobber_request_query() {
        let template = RequestTemplate::new().with_param("page", "1");
        let request = template
            .request(Method::GET, "https://example.com/jobs?page=5")
            .build()
            .unwrap();
        assert_eq!(request.url().query(), Some("page=5"));
    }

    #[test]
    fn test_per_request_timeout_wins() {
        let template = RequestTemplate::new().with_timeout(Duration::from_secs(60));
        let request = template
            .request(Method::GET, "https://example.com/")
            .timeout(Duration::from_secs(3))
            .build()
            .unwrap();
        assert_eq!(request.timeout(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_request_round_trip() {
        let request = Request::post("https://example.com/jobs?x=1")
            .header("x-trace", "t1")
            .body("payload")
            .timeout(Duration::from_secs(5))
            .max_redirects(3)
            .build()
            .unwrap();

        let json = serde_json::to_string(&request).unwrap();
        let back: Request = serde_json::from_str(&json).unwrap();
        assert_eq!(back, request);
    }
}
