//! HTTP request head parsing and representation.

use std::collections::HashMap;
use std::str::FromStr;

use url::form_urlencoded;

use crate::parser::error::Error;
use crate::parser::method::Method;
use crate::parser::version::HttpVersion;

/// The head of an HTTP request: everything before the body.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// The HTTP method (GET, POST, etc.)
    pub method: Method,
    /// The request target as sent, including any query string
    pub path: String,
    /// The HTTP version
    pub version: HttpVersion,
    /// The HTTP headers
    pub headers: HashMap<String, String>,
    /// Percent-decoded query parameters; the last occurrence of a name wins
    pub query_params: HashMap<String, String>,
}

impl HttpRequest {
    /// Create a new HTTP request head, decoding the query string of `path`.
    pub fn new(method: Method, path: String, version: HttpVersion, headers: HashMap<String, String>) -> Self {
        let query_params = path
            .split_once('?')
            .map(|(_, query)| {
                form_urlencoded::parse(query.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default();

        Self {
            method,
            path,
            version,
            headers,
            query_params,
        }
    }

    /// The request path without its query string.
    pub fn route_path(&self) -> &str {
        self.path.split_once('?').map_or(&self.path, |(path, _)| path)
    }

    /// Get a header value, ignoring the case of `name`.
    pub fn get_header(&self, name: &str) -> Option<&String> {
        self.headers
            .iter()
            .find_map(|(k, v)| k.eq_ignore_ascii_case(name).then_some(v))
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.get_header(name).is_some()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.get_header("Content-Type").map(String::as_str)
    }

    /// The declared body length, if any.
    pub fn content_length(&self) -> Result<Option<u64>, Error> {
        match self.get_header("Content-Length") {
            Some(value) => value
                .parse()
                .map(Some)
                .map_err(|_| Error::InvalidContentLength(value.clone())),
            None => Ok(None),
        }
    }

    /// Whether the body uses chunked transfer coding.
    pub fn is_chunked(&self) -> bool {
        self.get_header("Transfer-Encoding")
            .is_some_and(|value| value.split(',').any(|coding| coding.trim().eq_ignore_ascii_case("chunked")))
    }

    /// Whether this is a request to switch to the WebSocket protocol.
    pub fn is_websocket_upgrade(&self) -> bool {
        self.method == Method::GET
            && self
                .get_header("Upgrade")
                .is_some_and(|value| value.trim().eq_ignore_ascii_case("websocket"))
    }

    pub fn get_query_param(&self, name: &str) -> Option<&String> {
        self.query_params.get(name)
    }

    pub fn has_query_param(&self, name: &str) -> bool {
        self.query_params.contains_key(name)
    }
}

/// Position just past the blank line ending a request head, if `buf`
/// holds a complete head.
pub fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|at| at + 4)
}

/// Parse an HTTP request head from a byte slice.
///
/// Parsing stops at the first empty line; any bytes after it belong to the
/// body and are ignored.
pub fn parse_request(input: &[u8]) -> Result<HttpRequest, Error> {
    let input_str = match std::str::from_utf8(input) {
        Ok(s) => s,
        Err(_) => return Err(Error::MalformedRequestLine("Invalid UTF-8".to_string())),
    };

    let mut lines = input_str.lines();

    let request_line = match lines.next() {
        Some(line) => line,
        None => return Err(Error::EmptyRequest),
    };

    // Method, target and version
    let parts: Vec<&str> = request_line.split_whitespace().collect();
    if parts.len() != 3 {
        return Err(Error::MalformedRequestLine(request_line.to_string()));
    }

    let method = Method::from_str(parts[0])?;

    let path = parts[1].to_string();
    if !path.starts_with('/') {
        return Err(Error::InvalidPath);
    }

    let version = HttpVersion::from_str(parts[2])?;

    let mut headers = HashMap::new();
    for line in lines {
        if line.is_empty() {
            break;
        }

        let Some((name, value)) = line.split_once(':') else {
            return Err(Error::InvalidHeaderFormat);
        };
        headers.insert(name.trim().to_string(), value.trim().to_string());
    }

    if version == HttpVersion::Http11 && !headers.keys().any(|k| k.eq_ignore_ascii_case("Host")) {
        return Err(Error::MissingHeader("Host".to_string()));
    }

    Ok(HttpRequest::new(method, path, version, headers))
}
