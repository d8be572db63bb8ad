//! Raw body capture.

use std::time::Duration;

use log::debug;
use tokio::io::AsyncRead;

use crate::body::{read_bounded, BodyError, MAX_POST_SIZE};

/// Read up to [`MAX_POST_SIZE`] bytes of `body`.
///
/// A longer body is silently truncated; the handler gets the first
/// [`MAX_POST_SIZE`] bytes.
pub async fn decode_raw<R>(body: &mut R, read_timeout: Duration) -> Result<Vec<u8>, BodyError>
where
    R: AsyncRead + Unpin,
{
    let (bytes, truncated) = read_bounded(body, MAX_POST_SIZE, read_timeout).await?;
    if truncated {
        debug!("Raw body truncated at {MAX_POST_SIZE} bytes");
    }
    Ok(bytes)
}
