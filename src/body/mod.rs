//! Bounded request body decoding.
//!
//! The decoding strategy is chosen from the `Content-Type` prefix:
//!
//! - `multipart/form-data`: named parts, each at most [`MAX_POST_SIZE`]
//!   bytes. A larger part aborts the request. Reading stops once
//!   [`MAX_VARIABLES`] parts have been kept; later parts are dropped
//!   without an error.
//! - `application/x-www-form-urlencoded`: at most [`MAX_POST_SIZE`] bytes
//!   and [`MAX_VARIABLES`] variables are decoded; the rest is dropped.
//! - anything else: raw bytes, read in [`RAW_READ_CHUNK`] byte chunks and
//!   truncated at [`MAX_POST_SIZE`]. Any `Content-Length` claim is ignored.
//!
//! Every read is bounded by the caller's timeout. End of stream before the
//! body is complete ends decoding with whatever was read.

mod form;
mod multimap;
mod multipart;
mod raw;
mod tests;

use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

pub use form::decode_form;
pub use multimap::StringMultiMap;
pub use multipart::{decode_multipart, parse_boundary};
pub use raw::decode_raw;

/// Ceiling on a raw or url-encoded body, and on each multipart part.
pub const MAX_POST_SIZE: usize = 64 * 1024;

/// Ceiling on decoded form variables and multipart parts.
pub const MAX_VARIABLES: usize = 16;

/// Size of each read while collecting a raw body.
pub const RAW_READ_CHUNK: usize = 1024;

const MULTIPART_PREFIX: &str = "multipart/form-data";
const FORM_PREFIX: &str = "application/x-www-form-urlencoded";

/// Errors that abort body decoding.
#[derive(Debug, Error)]
pub enum BodyError {
    /// Reading from the transport failed.
    #[error("I/O error while reading body: {0}")]
    Io(#[from] std::io::Error),

    /// The transport produced no data within the read timeout.
    #[error("Timed out reading body")]
    TimedOut,

    /// The multipart `Content-Type` carries no usable boundary.
    #[error("Missing multipart boundary")]
    MissingBoundary,

    /// The multipart body does not follow the expected framing.
    #[error("Malformed multipart body: {0}")]
    Malformed(String),

    /// A single multipart part exceeded [`MAX_POST_SIZE`].
    #[error("Multipart part '{name}' exceeds {max} bytes")]
    PartTooLarge { name: String, max: usize },
}

/// The decoding strategy for a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyKind {
    Raw,
    Form,
    Multipart,
}

impl BodyKind {
    /// Select a strategy by case-sensitive prefix match on `Content-Type`.
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        match content_type {
            Some(ct) if ct.starts_with(MULTIPART_PREFIX) => BodyKind::Multipart,
            Some(ct) if ct.starts_with(FORM_PREFIX) => BodyKind::Form,
            _ => BodyKind::Raw,
        }
    }
}

/// A request body after decoding.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DecodedBody {
    #[default]
    None,
    Raw(Vec<u8>),
    Form(StringMultiMap<String>),
    Multipart(StringMultiMap<Vec<u8>>),
}

impl DecodedBody {
    pub fn as_raw(&self) -> Option<&[u8]> {
        match self {
            DecodedBody::Raw(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_form(&self) -> Option<&StringMultiMap<String>> {
        match self {
            DecodedBody::Form(form) => Some(form),
            _ => None,
        }
    }

    pub fn as_multipart(&self) -> Option<&StringMultiMap<Vec<u8>>> {
        match self {
            DecodedBody::Multipart(parts) => Some(parts),
            _ => None,
        }
    }
}

/// Decode `body` with the strategy selected by `content_type`.
pub async fn decode<R>(content_type: Option<&str>, body: &mut R, read_timeout: Duration) -> Result<DecodedBody, BodyError>
where
    R: AsyncRead + Unpin,
{
    decode_as(BodyKind::from_content_type(content_type), content_type, body, read_timeout).await
}

/// Decode `body` with an already selected strategy.
pub async fn decode_as<R>(
    kind: BodyKind,
    content_type: Option<&str>,
    body: &mut R,
    read_timeout: Duration,
) -> Result<DecodedBody, BodyError>
where
    R: AsyncRead + Unpin,
{
    match kind {
        BodyKind::Raw => decode_raw(body, read_timeout).await.map(DecodedBody::Raw),
        BodyKind::Form => decode_form(body, read_timeout).await.map(DecodedBody::Form),
        BodyKind::Multipart => decode_multipart(content_type.unwrap_or_default(), body, read_timeout)
            .await
            .map(DecodedBody::Multipart),
    }
}

/// One transport read, bounded by `read_timeout`. `Ok(0)` is end of stream.
pub(crate) async fn read_chunk<R>(body: &mut R, buf: &mut [u8], read_timeout: Duration) -> Result<usize, BodyError>
where
    R: AsyncRead + Unpin,
{
    match tokio::time::timeout(read_timeout, body.read(buf)).await {
        Ok(read) => Ok(read?),
        Err(_) => Err(BodyError::TimedOut),
    }
}

/// Read until end of stream or `limit` bytes, in `RAW_READ_CHUNK` steps.
///
/// The flag is `true` when the stream held more than `limit` bytes; the
/// excess stays unread apart from one byte.
pub(crate) async fn read_bounded<R>(body: &mut R, limit: usize, read_timeout: Duration) -> Result<(Vec<u8>, bool), BodyError>
where
    R: AsyncRead + Unpin,
{
    let mut holder = Vec::new();
    let mut chunk = [0u8; RAW_READ_CHUNK];
    while holder.len() < limit {
        let want = RAW_READ_CHUNK.min(limit - holder.len());
        let n = read_chunk(body, &mut chunk[..want], read_timeout).await?;
        if n == 0 {
            return Ok((holder, false));
        }
        holder.extend_from_slice(&chunk[..n]);
    }
    // A body of exactly `limit` bytes is complete, not truncated.
    let more = read_chunk(body, &mut chunk[..1], read_timeout).await? > 0;
    Ok((holder, more))
}
