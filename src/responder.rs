//! Rendering a path into a response.
//!
//! The [`Responder`] trait is the single seam between the publisher and the
//! application being published: given a path, return the status, content
//! type and body a browser would receive. Two implementations ship here:
//!
//! - [`HttpResponder`] issues a blocking `GET` against a running instance of
//!   the application. Redirects are not followed and no timeout is applied,
//!   so the response is exactly what the application produced.
//! - [`StaticResponder`] serves a fixed route table from memory. Unknown
//!   paths answer `404`.
//!
//! Responders are `&mut self` and not required to be `Sync`. When the
//! pipeline runs in parallel, every unit of work gets a fresh responder from
//! a factory closure instead of sharing one.

use crate::path::SitePath;
use reqwest::header::CONTENT_TYPE;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResponderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Invalid base URL: {0}")]
    BaseUrl(String),
}

/// A rendered response for one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    /// Full `Content-Type` header value, parameters included.
    pub content_type: String,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, content_type: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_type: content_type.into(),
            body: body.into(),
        }
    }

    /// `200 OK` with the given content.
    pub fn ok(content_type: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self::new(200, content_type, body)
    }

    /// Only 2xx responses may be published.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Turns a path into a response.
pub trait Responder {
    fn get(&mut self, path: &SitePath) -> Result<Response, ResponderError>;
}

impl<R: Responder + ?Sized> Responder for Box<R> {
    fn get(&mut self, path: &SitePath) -> Result<Response, ResponderError> {
        (**self).get(path)
    }
}

/// Fetches paths from a running application over HTTP.
///
/// Clones share one connection pool.
#[derive(Clone)]
pub struct HttpResponder {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpResponder {
    pub fn new(base_url: &str) -> Result<Self, ResponderError> {
        let base_url = base_url.trim_end_matches('/');
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ResponderError::BaseUrl(base_url.to_string()));
        }
        let client = reqwest::blocking::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(None)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    pub fn url_for(&self, path: &SitePath) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Responder for HttpResponder {
    fn get(&mut self, path: &SitePath) -> Result<Response, ResponderError> {
        let url = self.url_for(path);
        tracing::debug!(%url, "fetching");
        let resp = self.client.get(&url).send()?;
        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = resp.bytes()?.to_vec();
        Ok(Response {
            status,
            content_type,
            body,
        })
    }
}

/// Serves a fixed table of responses. Paths not in the table get a 404.
#[derive(Debug, Clone, Default)]
pub struct StaticResponder {
    routes: HashMap<String, Response>,
}

impl StaticResponder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the response for a path.
    pub fn route(mut self, path: &str, response: Response) -> Self {
        self.routes.insert(path.to_string(), response);
        self
    }
}

impl Responder for StaticResponder {
    fn get(&mut self, path: &SitePath) -> Result<Response, ResponderError> {
        Ok(self
            .routes
            .get(path.as_str())
            .cloned()
            .unwrap_or_else(|| Response::new(404, "text/html", "Not Found")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(raw: &str) -> SitePath {
        SitePath::parse(raw).unwrap()
    }

    #[test]
    fn success_range() {
        assert!(Response::ok("text/html", "").is_success());
        assert!(Response::new(204, "text/html", "").is_success());
        assert!(!Response::new(301, "text/html", "").is_success());
        assert!(!Response::new(404, "text/html", "").is_success());
        assert!(!Response::new(500, "text/html", "").is_success());
    }

    #[test]
    fn static_responder_serves_routes() {
        let mut r = StaticResponder::new().route("/", Response::ok("text/html", "hello"));
        let resp = r.get(&p("/")).unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, b"hello");
    }

    #[test]
    fn static_responder_unknown_is_404() {
        let mut r = StaticResponder::new();
        assert_eq!(r.get(&p("/missing")).unwrap().status, 404);
    }

    #[test]
    fn boxed_responder_delegates() {
        let mut r: Box<dyn Responder> =
            Box::new(StaticResponder::new().route("/a", Response::ok("text/plain", "a")));
        assert_eq!(r.get(&p("/a")).unwrap().body, b"a");
    }

    #[test]
    fn http_responder_rejects_bad_base_url() {
        assert!(matches!(
            HttpResponder::new("localhost:8000"),
            Err(ResponderError::BaseUrl(_))
        ));
    }

    #[test]
    fn http_responder_joins_url() {
        let r = HttpResponder::new("http://127.0.0.1:8000/").unwrap();
        assert_eq!(r.url_for(&p("/about/")), "http://127.0.0.1:8000/about/");
    }
}
