//! `application/x-www-form-urlencoded` bodies.

use std::time::Duration;

use log::debug;
use tokio::io::AsyncRead;
use url::form_urlencoded;

use crate::body::{read_bounded, BodyError, StringMultiMap, MAX_POST_SIZE, MAX_VARIABLES};

/// Decode a url-encoded form of at most [`MAX_POST_SIZE`] bytes and
/// [`MAX_VARIABLES`] variables.
///
/// When the body is cut at the byte limit, the trailing pair is incomplete
/// and is dropped along with everything after it.
pub async fn decode_form<R>(body: &mut R, read_timeout: Duration) -> Result<StringMultiMap<String>, BodyError>
where
    R: AsyncRead + Unpin,
{
    let (bytes, truncated) = read_bounded(body, MAX_POST_SIZE, read_timeout).await?;
    let usable = if truncated {
        debug!("Form body truncated at {MAX_POST_SIZE} bytes");
        let end = bytes.iter().rposition(|&b| b == b'&').unwrap_or(0);
        &bytes[..end]
    } else {
        &bytes[..]
    };
    Ok(parse_form(usable))
}

/// Parse url-encoded pairs, keeping at most [`MAX_VARIABLES`].
pub(crate) fn parse_form(bytes: &[u8]) -> StringMultiMap<String> {
    let mut form = StringMultiMap::new();
    for (key, value) in form_urlencoded::parse(bytes) {
        if form.value_count() == MAX_VARIABLES {
            debug!("Form body has more than {MAX_VARIABLES} variables; ignoring the rest");
            break;
        }
        form.append(key.into_owned(), value.into_owned());
    }
    form
}
