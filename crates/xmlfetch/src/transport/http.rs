//! Plain HTTP/1.1 client over tokio

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, instrument};
use url::Url;

use crate::config::DEFAULT_MAX_SIZE;
use crate::error::{Error, Result};
use crate::transport::{Request, Transport};

/// Default time allowed for a whole exchange, redirects included
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of redirects followed before giving up
pub const DEFAULT_MAX_REDIRECTS: u8 = 5;

/// Default cap on a raw response, headers included
pub const DEFAULT_MAX_RESPONSE_SIZE: usize = DEFAULT_MAX_SIZE + 64 * 1024;

const DEFAULT_USER_AGENT: &str = concat!("xmlfetch/", env!("CARGO_PKG_VERSION"));

/// Fetches `http://` URLs with `GET`, or `POST` when the request has a body
#[derive(Clone, Debug)]
pub struct HttpTransport {
    timeout: Duration,
    user_agent: String,
    max_redirects: u8,
    max_response_size: usize,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            max_response_size: DEFAULT_MAX_RESPONSE_SIZE,
        }
    }
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_max_redirects(mut self, max_redirects: u8) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    /// Give up on responses larger than `max_response_size` bytes (0 means unlimited)
    pub fn with_max_response_size(mut self, max_response_size: usize) -> Self {
        self.max_response_size = max_response_size;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn fetch_following_redirects(&self, request: &Request) -> Result<Vec<u8>> {
        let mut url = parse_url(&request.target)?;
        let mut body = request.body.as_deref();

        for _ in 0..=self.max_redirects {
            let response = self.exchange(&url, body).await?;
            match (response.status, response.location) {
                (301 | 302 | 303 | 307 | 308, Some(location)) => {
                    let next = url.join(&location).map_err(|err| {
                        Error::transport(format!("invalid redirect location {location}: {err}"))
                    })?;
                    debug!(from = %url, to = %next, status = response.status, "following redirect");
                    if !matches!(response.status, 307 | 308) {
                        body = None;
                    }
                    url = next;
                }
                (200..=299, _) => return Ok(response.body),
                (status, _) => {
                    return Err(Error::http_status(
                        status,
                        format!("{url} returned HTTP {status} {}", response.reason),
                    ));
                }
            }
        }

        Err(Error::transport(format!(
            "too many redirects fetching {}",
            request.target
        )))
    }

    async fn exchange(&self, url: &Url, body: Option<&str>) -> Result<Response> {
        if url.scheme() != "http" {
            return Err(Error::transport(format!(
                "unsupported url scheme: {}",
                url.scheme()
            )));
        }
        let host = url
            .host_str()
            .ok_or_else(|| Error::transport(format!("url has no host: {url}")))?;
        let port = url.port_or_known_default().unwrap_or(80);
        let addr = format!("{host}:{port}");

        let mut stream = TcpStream::connect(&addr)
            .await
            .map_err(|err| Error::transport(format!("failed to connect to {addr}: {err}")))?;

        let head = request_head(url, host, port, body, &self.user_agent);
        stream
            .write_all(head.as_bytes())
            .await
            .map_err(|err| Error::transport(format!("failed to send request to {addr}: {err}")))?;
        if let Some(body) = body {
            stream.write_all(body.as_bytes()).await.map_err(|err| {
                Error::transport(format!("failed to send request body to {addr}: {err}"))
            })?;
        }

        let mut raw = Vec::new();
        let limit = match self.max_response_size {
            0 => u64::MAX,
            max => u64::try_from(max).unwrap_or(u64::MAX).saturating_add(1),
        };
        (&mut stream)
            .take(limit)
            .read_to_end(&mut raw)
            .await
            .map_err(|err| Error::transport(format!("failed to read response from {addr}: {err}")))?;
        if self.max_response_size > 0 && raw.len() > self.max_response_size {
            return Err(Error::transport(format!(
                "response from {addr} exceeds {} bytes",
                self.max_response_size
            )));
        }
        debug!(%url, bytes = raw.len(), "response received");

        parse_response(&raw)
    }
}

impl Transport for HttpTransport {
    #[instrument(skip(self, request), fields(target = %request.target))]
    async fn fetch(&self, request: &Request) -> Result<Vec<u8>> {
        match tokio::time::timeout(self.timeout, self.fetch_following_redirects(request)).await {
            Ok(result) => result,
            Err(_) => Err(Error::transport(format!(
                "request to {} timed out after {:?}",
                request.target, self.timeout
            ))),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
struct Response {
    status: u16,
    reason: String,
    location: Option<String>,
    body: Vec<u8>,
}

fn parse_url(target: &str) -> Result<Url> {
    Url::parse(target).map_err(|err| Error::transport(format!("invalid url {target}: {err}")))
}

fn request_head(url: &Url, host: &str, port: u16, body: Option<&str>, user_agent: &str) -> String {
    let mut target = url.path().to_string();
    if let Some(query) = url.query() {
        target.push('?');
        target.push_str(query);
    }
    let host_header = if port == 80 {
        host.to_string()
    } else {
        format!("{host}:{port}")
    };
    let method = if body.is_some() { "POST" } else { "GET" };

    let mut head = format!(
        "{method} {target} HTTP/1.1\r\nHost: {host_header}\r\nUser-Agent: {user_agent}\r\nAccept: application/xml, text/xml, */*\r\nConnection: close\r\n"
    );
    if let Some(body) = body {
        head.push_str("Content-Type: application/x-www-form-urlencoded\r\n");
        head.push_str(&format!("Content-Length: {}\r\n", body.len()));
    }
    head.push_str("\r\n");
    head
}

fn parse_response(raw: &[u8]) -> Result<Response> {
    let head_end = find(raw, b"\r\n\r\n")
        .ok_or_else(|| Error::transport("malformed http response: missing header terminator"))?;
    let head = raw
        .get(..head_end)
        .and_then(|head| std::str::from_utf8(head).ok())
        .ok_or_else(|| Error::transport("malformed http response: invalid header encoding"))?;
    let payload = raw.get(head_end + 4..).unwrap_or_default();

    let mut lines = head.split("\r\n");
    let status_line = lines.next().unwrap_or_default();
    let mut parts = status_line.splitn(3, ' ');
    let version = parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/") {
        return Err(Error::transport(format!(
            "malformed http status line: {status_line}"
        )));
    }
    let status = parts
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| Error::transport(format!("malformed http status line: {status_line}")))?;
    let reason = parts.next().unwrap_or_default().to_string();

    let mut content_length = None;
    let mut chunked = false;
    let mut location = None;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if name.eq_ignore_ascii_case("content-length") {
            content_length = value.parse::<usize>().ok();
        } else if name.eq_ignore_ascii_case("transfer-encoding") {
            chunked = value.to_ascii_lowercase().contains("chunked");
        } else if name.eq_ignore_ascii_case("location") {
            location = Some(value.to_string());
        }
    }

    let body = if chunked {
        decode_chunked(payload)?
    } else if let Some(len) = content_length {
        payload
            .get(..len)
            .ok_or_else(|| Error::transport("http response body shorter than content-length"))?
            .to_vec()
    } else {
        payload.to_vec()
    };

    Ok(Response {
        status,
        reason,
        location,
        body,
    })
}

fn decode_chunked(mut rest: &[u8]) -> Result<Vec<u8>> {
    let truncated = || Error::transport("truncated chunked http body");
    let mut body = Vec::new();

    loop {
        let line_end = find(rest, b"\r\n").ok_or_else(truncated)?;
        let size_line = rest
            .get(..line_end)
            .and_then(|line| std::str::from_utf8(line).ok())
            .ok_or_else(truncated)?;
        let size_hex = size_line.split(';').next().unwrap_or_default().trim();
        let size = usize::from_str_radix(size_hex, 16)
            .map_err(|_| Error::transport(format!("invalid chunk size: {size_hex}")))?;
        rest = rest.get(line_end + 2..).ok_or_else(truncated)?;

        if size == 0 {
            return Ok(body);
        }
        body.extend_from_slice(rest.get(..size).ok_or_else(truncated)?);
        rest = rest.get(size + 2..).ok_or_else(truncated)?;
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_head() -> Result<()> {
        let url = parse_url("http://example.com/feed?page=2")?;
        let head = request_head(&url, "example.com", 80, None, "ua/1");
        assert!(head.starts_with("GET /feed?page=2 HTTP/1.1\r\nHost: example.com\r\n"));
        assert!(head.contains("Connection: close\r\n"));
        assert!(head.ends_with("\r\n\r\n"));
        assert!(!head.contains("Content-Length"));
        Ok(())
    }

    #[test]
    fn test_post_head() -> Result<()> {
        let url = parse_url("http://localhost:8080/search")?;
        let head = request_head(&url, "localhost", 8080, Some("q=a"), "ua/1");
        assert!(head.starts_with("POST /search HTTP/1.1\r\nHost: localhost:8080\r\n"));
        assert!(head.contains("Content-Length: 3\r\n"));
        Ok(())
    }

    #[test]
    fn test_parse_content_length_response() -> Result<()> {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Type: text/xml\r\nContent-Length: 4\r\n\r\n<a/>trailing";
        let response = parse_response(raw)?;
        assert_eq!(response.status, 200);
        assert_eq!(response.reason, "OK");
        assert_eq!(response.body, b"<a/>");
        Ok(())
    }

    #[test]
    fn test_parse_chunked_response() -> Result<()> {
        let raw = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n3\r\n<a>\r\n4;ext=1\r\n</a>\r\n0\r\n\r\n";
        assert_eq!(parse_response(raw)?.body, b"<a></a>");
        Ok(())
    }

    #[test]
    fn test_parse_read_to_eof_response() -> Result<()> {
        let raw = b"HTTP/1.0 200 OK\r\n\r\n<root/>";
        assert_eq!(parse_response(raw)?.body, b"<root/>");
        Ok(())
    }

    #[test]
    fn test_parse_redirect_location() -> Result<()> {
        let raw = b"HTTP/1.1 302 Found\r\nLocation: /next\r\nContent-Length: 0\r\n\r\n";
        let response = parse_response(raw)?;
        assert_eq!(response.status, 302);
        assert_eq!(response.location.as_deref(), Some("/next"));
        Ok(())
    }

    #[test]
    fn test_truncated_chunked_body() {
        let raw = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\nff\r\n<a>";
        assert!(parse_response(raw).is_err_and(|e| e.is_transport()));
    }

    #[test]
    fn test_garbage_response() {
        assert!(parse_response(b"not http at all").is_err());
        assert!(parse_response(b"SMTP ready\r\n\r\n").is_err());
    }

    #[tokio::test]
    async fn test_unsupported_scheme() {
        let err = HttpTransport::new()
            .fetch(&Request::get("ftp://example.com/a.xml"))
            .await
            .err();
        assert!(err.is_some_and(|e| e.message().contains("unsupported url scheme")));
    }
}
