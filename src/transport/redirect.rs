//! Redirect-following policy.

use crate::errors::RedirectErrorKind;
use crate::types::HttpHeaders;
use http::Method;
use std::collections::HashSet;
use url::Url;

/// Tracks a redirect chain: the cap, and the set of visited URLs for cycle
/// detection.
pub(crate) struct RedirectChain {
    visited: HashSet<String>,
    followed: u32,
    max: u32,
}

impl RedirectChain {
    /// Start a chain at `initial`.
    pub fn new(initial: &Url, max: u32) -> Self {
        let mut visited = HashSet::new();
        visited.insert(normalized(initial));
        Self { visited, followed: 0, max }
    }

    /// Register a hop to `next`. Errors when the cap is exceeded or the
    /// chain revisits a URL it has already seen.
    pub fn follow(&mut self, next: &Url) -> Result<(), RedirectErrorKind> {
        if self.followed >= self.max {
            return Err(RedirectErrorKind::TooMany);
        }
        if !self.visited.insert(normalized(next)) {
            return Err(RedirectErrorKind::Recursive);
        }
        self.followed += 1;
        Ok(())
    }
}

/// Normalized form used for cycle detection: the URL without its fragment.
fn normalized(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.to_string()
}

/// Whether a redirect converts the method to GET and drops the body.
///
/// 301/302/303 convert body-bearing non-GET methods; 307/308 preserve
/// method and body.
pub(crate) fn converts_to_get(status: u16, method: &Method, has_body: bool) -> bool {
    matches!(status, 301 | 302 | 303) && *method != Method::GET && has_body
}

/// Apply cross-origin hygiene when hopping from `from` to `to`: credentials
/// must not leak to another origin.
pub(crate) fn sanitize_cross_origin(headers: &mut HttpHeaders, from: &Url, to: &Url) {
    if !same_origin(from, to) {
        headers.remove("authorization");
    }
}

fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme()
        && a.host_str().map(str::to_ascii_lowercase) == b.host_str().map(str::to_ascii_lowercase)
        && a.port_or_known_default() == b.port_or_known_default()
}
