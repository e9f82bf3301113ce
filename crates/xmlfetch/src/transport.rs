//! Transport adapters delivering raw document bytes
//!
//! A transport only moves bytes: it knows nothing about XML and never
//! retries. Failures surface as [`ErrorKind::Transport`](crate::ErrorKind::Transport).

use std::future::Future;

use crate::error::Result;

pub mod file;
pub mod http;

pub use file::FileTransport;
pub use http::HttpTransport;

/// What to fetch
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    /// URL, or a filesystem path for [`FileTransport`]
    pub target: String,
    /// Form-encoded request body; turns an HTTP request into a POST
    pub body: Option<String>,
}

impl Request {
    pub fn get(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            body: None,
        }
    }

    pub fn post(target: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            body: Some(body.into()),
        }
    }

    pub fn is_http(&self) -> bool {
        self.target
            .get(..7)
            .is_some_and(|scheme| scheme.eq_ignore_ascii_case("http://"))
    }
}

/// Asynchronous source of a complete document
pub trait Transport {
    /// Retrieve the whole payload for `request`
    fn fetch(&self, request: &Request) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

/// Routes `http://` targets over HTTP and everything else to the filesystem
#[derive(Clone, Debug, Default)]
pub struct AnyTransport {
    pub http: HttpTransport,
    pub file: FileTransport,
}

impl AnyTransport {
    pub fn new(http: HttpTransport) -> Self {
        Self {
            http,
            file: FileTransport,
        }
    }
}

impl Transport for AnyTransport {
    async fn fetch(&self, request: &Request) -> Result<Vec<u8>> {
        if request.is_http() {
            self.http.fetch(request).await
        } else {
            self.file.fetch(request).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_constructors() {
        let get = Request::get("http://example.com/feed");
        assert_eq!(get.body, None);
        assert!(get.is_http());

        let post = Request::post("http://example.com/search", "q=rust");
        assert_eq!(post.body.as_deref(), Some("q=rust"));
    }

    #[test]
    fn test_is_http() {
        assert!(Request::get("HTTP://EXAMPLE.COM").is_http());
        assert!(!Request::get("https://example.com").is_http());
        assert!(!Request::get("file:///tmp/a.xml").is_http());
        assert!(!Request::get("a.xml").is_http());
    }
}
