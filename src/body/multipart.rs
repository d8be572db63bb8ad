//! `multipart/form-data` bodies.
//!
//! Parts are read incrementally from the transport so that an oversized
//! part is detected as soon as it crosses the limit, and reading stops as
//! soon as enough parts have been kept.

use std::time::Duration;

use log::debug;
use tokio::io::AsyncRead;

use crate::body::{read_chunk, BodyError, StringMultiMap, MAX_POST_SIZE, MAX_VARIABLES};

/// Ceiling on the header block of a single part.
const MAX_PART_HEADER_SIZE: usize = 8 * 1024;

/// Ceiling on data skipped before the opening boundary.
const MAX_PREAMBLE_SIZE: usize = MAX_POST_SIZE;

const READ_SIZE: usize = 4096;

/// Parse the boundary parameter from a multipart `Content-Type`.
///
/// Format: `multipart/form-data; boundary=----WebKitFormBoundary...`
pub fn parse_boundary(content_type: &str) -> Result<String, BodyError> {
    for param in content_type.split(';').skip(1) {
        let Some((name, value)) = param.split_once('=') else {
            continue;
        };
        if name.trim().eq_ignore_ascii_case("boundary") {
            let boundary = value.trim().trim_matches('"');
            if boundary.is_empty() || boundary.len() > 70 {
                return Err(BodyError::MissingBoundary);
            }
            return Ok(boundary.to_string());
        }
    }
    Err(BodyError::MissingBoundary)
}

/// Decode up to [`MAX_VARIABLES`] parts from `body`.
///
/// A part larger than [`MAX_POST_SIZE`] fails the whole body with
/// [`BodyError::PartTooLarge`]. Parts after the first [`MAX_VARIABLES`] are
/// never read. If the stream ends early, the complete parts read so far
/// are returned.
pub async fn decode_multipart<R>(
    content_type: &str,
    body: &mut R,
    read_timeout: Duration,
) -> Result<StringMultiMap<Vec<u8>>, BodyError>
where
    R: AsyncRead + Unpin,
{
    let boundary = parse_boundary(content_type)?;
    let mut reader = PartReader::new(body, &boundary, read_timeout);
    let mut parts = StringMultiMap::new();

    if !reader.skip_preamble().await? {
        return Ok(parts);
    }

    while parts.value_count() < MAX_VARIABLES {
        match reader.next_part().await? {
            Some((name, data)) => parts.append(name, data),
            None => return Ok(parts),
        }
    }

    if !reader.finished {
        debug!("Stopped reading multipart body after {MAX_VARIABLES} parts");
    }
    Ok(parts)
}

struct PartReader<'a, R> {
    body: &'a mut R,
    read_timeout: Duration,
    /// `--boundary`, as it appears at the very start of the body.
    dash_boundary: Vec<u8>,
    /// `\r\n--boundary`, which ends every part's data.
    delimiter: Vec<u8>,
    buf: Vec<u8>,
    eof: bool,
    finished: bool,
}

impl<'a, R> PartReader<'a, R>
where
    R: AsyncRead + Unpin,
{
    fn new(body: &'a mut R, boundary: &str, read_timeout: Duration) -> Self {
        let dash_boundary = format!("--{boundary}").into_bytes();
        let mut delimiter = b"\r\n".to_vec();
        delimiter.extend_from_slice(&dash_boundary);
        Self {
            body,
            read_timeout,
            dash_boundary,
            delimiter,
            buf: Vec::new(),
            eof: false,
            finished: false,
        }
    }

    /// Append the next transport read to the buffer. `false` at end of
    /// stream.
    async fn fill(&mut self) -> Result<bool, BodyError> {
        if self.eof {
            return Ok(false);
        }
        let mut chunk = [0u8; READ_SIZE];
        let n = read_chunk(&mut *self.body, &mut chunk, self.read_timeout).await?;
        if n == 0 {
            self.eof = true;
            return Ok(false);
        }
        self.buf.extend_from_slice(&chunk[..n]);
        Ok(true)
    }

    /// Consume everything up to and including the opening boundary.
    async fn skip_preamble(&mut self) -> Result<bool, BodyError> {
        let mut scan_from = 0;
        loop {
            if let Some(at) = find(&self.buf, &self.dash_boundary, scan_from) {
                self.buf.drain(..at + self.dash_boundary.len());
                return Ok(true);
            }
            if self.buf.len() > MAX_PREAMBLE_SIZE {
                return Err(BodyError::Malformed("no opening boundary".to_string()));
            }
            scan_from = self.buf.len().saturating_sub(self.dash_boundary.len() - 1);
            if !self.fill().await? {
                debug!("Multipart body ended before the opening boundary");
                self.finished = true;
                return Ok(false);
            }
        }
    }

    /// Make sure at least `n` bytes are buffered. `false` at end of stream.
    async fn ensure(&mut self, n: usize) -> Result<bool, BodyError> {
        while self.buf.len() < n {
            if !self.fill().await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Read one part, positioned just after a boundary.
    ///
    /// Returns `None` after the closing boundary or at end of stream.
    async fn next_part(&mut self) -> Result<Option<(String, Vec<u8>)>, BodyError> {
        if self.finished || !self.ensure(2).await? {
            return Ok(self.stop());
        }
        if self.buf.starts_with(b"--") {
            return Ok(self.stop());
        }
        if !self.buf.starts_with(b"\r\n") {
            return Err(BodyError::Malformed("expected CRLF after boundary".to_string()));
        }
        self.buf.drain(..2);

        let Some(name) = self.read_headers().await? else {
            return Ok(self.stop());
        };

        let mut scan_from = 0;
        loop {
            if let Some(at) = find(&self.buf, &self.delimiter, scan_from) {
                if at > MAX_POST_SIZE {
                    return Err(BodyError::PartTooLarge { name, max: MAX_POST_SIZE });
                }
                let data = self.buf[..at].to_vec();
                self.buf.drain(..at + self.delimiter.len());
                return Ok(Some((name, data)));
            }
            // The delimiter is absent, so at least this much is part data.
            let known_data = self.buf.len().saturating_sub(self.delimiter.len() - 1);
            if known_data > MAX_POST_SIZE {
                return Err(BodyError::PartTooLarge { name, max: MAX_POST_SIZE });
            }
            scan_from = known_data;
            if !self.fill().await? {
                debug!("Multipart body ended inside part '{name}'; dropping it");
                return Ok(self.stop());
            }
        }
    }

    /// Read a part's header block and return its field name.
    async fn read_headers(&mut self) -> Result<Option<String>, BodyError> {
        let mut scan_from = 0;
        let header_end = loop {
            if self.buf.starts_with(b"\r\n") {
                break 0;
            }
            if let Some(at) = find(&self.buf, b"\r\n\r\n", scan_from) {
                break at + 2;
            }
            if self.buf.len() > MAX_PART_HEADER_SIZE {
                return Err(BodyError::Malformed("part headers too large".to_string()));
            }
            scan_from = self.buf.len().saturating_sub(3);
            if !self.fill().await? {
                return Ok(None);
            }
        };

        let block = std::str::from_utf8(&self.buf[..header_end])
            .map_err(|_| BodyError::Malformed("invalid UTF-8 in part headers".to_string()))?;
        let name = block
            .split("\r\n")
            .filter_map(|line| line.split_once(':'))
            .find(|(header, _)| header.trim().eq_ignore_ascii_case("content-disposition"))
            .and_then(|(_, value)| disposition_name(value))
            .ok_or_else(|| BodyError::Malformed("part without a Content-Disposition name".to_string()))?;

        self.buf.drain(..header_end + 2);
        Ok(Some(name))
    }

    fn stop(&mut self) -> Option<(String, Vec<u8>)> {
        self.finished = true;
        None
    }
}

/// Extract `name` from `form-data; name="field"; filename="a.txt"`.
fn disposition_name(value: &str) -> Option<String> {
    value.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("name")
            .then(|| unquote(value).to_string())
    })
}

fn unquote(s: &str) -> &str {
    let s = s.trim();
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if haystack.len() < needle.len() || from > haystack.len() - needle.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|at| at + from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_boundary() {
        assert_eq!(parse_boundary("multipart/form-data; boundary=abc").unwrap(), "abc");
        assert_eq!(parse_boundary("multipart/form-data; charset=utf-8; Boundary=\"x y\"").unwrap(), "x y");
        assert!(matches!(parse_boundary("multipart/form-data"), Err(BodyError::MissingBoundary)));
        assert!(matches!(parse_boundary("multipart/form-data; boundary="), Err(BodyError::MissingBoundary)));
    }

    #[test]
    fn test_disposition_name() {
        assert_eq!(disposition_name("form-data; name=\"var1\""), Some("var1".to_string()));
        assert_eq!(disposition_name("form-data; name=plain; filename=\"a.txt\""), Some("plain".to_string()));
        assert_eq!(disposition_name("form-data; filename=\"a.txt\""), None);
    }

    #[test]
    fn test_find() {
        assert_eq!(find(b"abcabc", b"bc", 0), Some(1));
        assert_eq!(find(b"abcabc", b"bc", 2), Some(4));
        assert_eq!(find(b"ab", b"abc", 0), None);
        assert_eq!(find(b"abc", b"c", 3), None);
    }
}
