//! Tests for body decoding.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::body::{decode, BodyError, BodyKind, DecodedBody, StringMultiMap, MAX_POST_SIZE, MAX_VARIABLES};

    const TIMEOUT: Duration = Duration::from_secs(5);
    const BOUNDARY: &str = "XyZ-boundary-123";

    fn multipart_content_type() -> String {
        format!("multipart/form-data; boundary={BOUNDARY}")
    }

    fn multipart_body(parts: &[(&str, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, data) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            body.extend_from_slice(format!("Content-Disposition: form-data; name=\"{name}\"\r\n").as_bytes());
            body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    async fn decode_bytes(content_type: Option<&str>, bytes: &[u8]) -> Result<DecodedBody, BodyError> {
        let mut body: &[u8] = bytes;
        decode(content_type, &mut body, TIMEOUT).await
    }

    #[test]
    fn test_body_kind_selection() {
        assert_eq!(BodyKind::from_content_type(None), BodyKind::Raw);
        assert_eq!(BodyKind::from_content_type(Some("application/octet-stream")), BodyKind::Raw);
        assert_eq!(
            BodyKind::from_content_type(Some("multipart/form-data; boundary=abc")),
            BodyKind::Multipart
        );
        assert_eq!(
            BodyKind::from_content_type(Some("application/x-www-form-urlencoded; charset=UTF-8")),
            BodyKind::Form
        );
        // The documented prefixes are matched case-sensitively.
        assert_eq!(BodyKind::from_content_type(Some("Multipart/Form-Data; boundary=abc")), BodyKind::Raw);
    }

    #[tokio::test]
    async fn test_raw_small_body() {
        let decoded = decode_bytes(Some("application/octet-stream"), &[1, 2, 3]).await.unwrap();
        assert_eq!(decoded, DecodedBody::Raw(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_raw_body_truncated_at_limit() {
        let bytes: Vec<u8> = (0..MAX_POST_SIZE + 5000).map(|i| (i % 251) as u8).collect();
        let decoded = decode_bytes(None, &bytes).await.unwrap();

        let raw = decoded.as_raw().unwrap();
        assert_eq!(raw.len(), MAX_POST_SIZE);
        assert_eq!(raw, &bytes[..MAX_POST_SIZE]);
    }

    #[tokio::test]
    async fn test_raw_empty_body() {
        let decoded = decode_bytes(None, &[]).await.unwrap();
        assert_eq!(decoded, DecodedBody::Raw(Vec::new()));
    }

    #[tokio::test]
    async fn test_form_duplicates_are_kept() {
        let decoded = decode_bytes(Some("application/x-www-form-urlencoded"), b"var1=val1&var1=a&var2=b")
            .await
            .unwrap();

        let form = decoded.as_form().unwrap();
        assert_eq!(form.value_count(), 3);
        assert_eq!(form.get_all("var1").cloned().collect::<Vec<_>>(), vec!["val1", "a"]);
        assert_eq!(form.get("var2").map(String::as_str), Some("b"));
    }

    #[tokio::test]
    async fn test_form_percent_decoding() {
        let decoded = decode_bytes(
            Some("application/x-www-form-urlencoded; charset=UTF-8"),
            b"greeting=hello%20there&plus=a+b&check=%E2%9C%93",
        )
        .await
        .unwrap();

        let form = decoded.as_form().unwrap();
        assert_eq!(form.get("greeting").unwrap(), "hello there");
        assert_eq!(form.get("plus").unwrap(), "a b");
        assert_eq!(form.get("check").unwrap(), "\u{2713}");
    }

    #[tokio::test]
    async fn test_form_variable_limit() {
        let body: Vec<String> = (0..MAX_VARIABLES + 4).map(|i| format!("k{i}=v{i}")).collect();
        let decoded = decode_bytes(Some("application/x-www-form-urlencoded"), body.join("&").as_bytes())
            .await
            .unwrap();

        let form = decoded.as_form().unwrap();
        assert_eq!(form.value_count(), MAX_VARIABLES);
        assert!(form.contains_key("k15"));
        assert!(!form.contains_key("k16"));
    }

    #[tokio::test]
    async fn test_form_truncated_drops_partial_pair() {
        let mut body = b"a=1&b=".to_vec();
        body.resize(MAX_POST_SIZE + 100, b'x');
        let decoded = decode_bytes(Some("application/x-www-form-urlencoded"), &body).await.unwrap();

        let form = decoded.as_form().unwrap();
        assert_eq!(form.value_count(), 1);
        assert_eq!(form.get("a").unwrap(), "1");
    }

    #[tokio::test]
    async fn test_form_at_exact_limit_keeps_last_pair() {
        let mut body = b"a=1&b=".to_vec();
        body.resize(MAX_POST_SIZE, b'x');
        let decoded = decode_bytes(Some("application/x-www-form-urlencoded"), &body).await.unwrap();

        let form = decoded.as_form().unwrap();
        assert_eq!(form.value_count(), 2);
        assert_eq!(form.get("b").unwrap().len(), MAX_POST_SIZE - 6);
    }

    #[tokio::test]
    async fn test_multipart_parts() {
        let body = multipart_body(&[("var1", b"val1"), ("var2", b"")]);
        let decoded = decode_bytes(Some(&multipart_content_type()), &body).await.unwrap();

        let parts = decoded.as_multipart().unwrap();
        assert_eq!(parts.value_count(), 2);
        assert_eq!(parts.get("var1").unwrap(), b"val1");
        assert_eq!(parts.get("var2").unwrap(), b"");
    }

    #[tokio::test]
    async fn test_multipart_duplicates_are_kept() {
        let body = multipart_body(&[("var1", b"val1"), ("var1", b"a"), ("var2", b"b")]);
        let decoded = decode_bytes(Some(&multipart_content_type()), &body).await.unwrap();

        let parts = decoded.as_multipart().unwrap();
        assert_eq!(parts.value_count(), 3);
        let values: Vec<&Vec<u8>> = parts.get_all("var1").collect();
        assert_eq!(values, vec![&b"val1".to_vec(), &b"a".to_vec()]);
    }

    #[tokio::test]
    async fn test_multipart_binary_data_with_crlf() {
        let data = b"line1\r\nline2\r\n--not-the-boundary\r\n";
        let body = multipart_body(&[("file", data)]);
        let decoded = decode_bytes(Some(&multipart_content_type()), &body).await.unwrap();

        assert_eq!(decoded.as_multipart().unwrap().get("file").unwrap(), data);
    }

    #[tokio::test]
    async fn test_multipart_stops_after_limit() {
        let names: Vec<String> = (0..MAX_VARIABLES + 1).map(|i| format!("p{i}")).collect();
        let parts: Vec<(&str, &[u8])> = names.iter().map(|n| (n.as_str(), b"x" as &[u8])).collect();
        let body = multipart_body(&parts);
        let decoded = decode_bytes(Some(&multipart_content_type()), &body).await.unwrap();

        let parts = decoded.as_multipart().unwrap();
        assert_eq!(parts.value_count(), MAX_VARIABLES);
        assert!(parts.contains_key("p15"));
        assert!(!parts.contains_key("p16"));
    }

    #[tokio::test]
    async fn test_multipart_part_at_limit_is_accepted() {
        let data = vec![7u8; MAX_POST_SIZE];
        let body = multipart_body(&[("big", &data)]);
        let decoded = decode_bytes(Some(&multipart_content_type()), &body).await.unwrap();

        assert_eq!(decoded.as_multipart().unwrap().get("big").unwrap().len(), MAX_POST_SIZE);
    }

    #[tokio::test]
    async fn test_multipart_part_too_large() {
        let data = vec![7u8; MAX_POST_SIZE + 1];
        let body = multipart_body(&[("small", b"ok"), ("big", &data)]);
        let err = decode_bytes(Some(&multipart_content_type()), &body).await.unwrap_err();

        assert!(matches!(err, BodyError::PartTooLarge { ref name, max } if name == "big" && max == MAX_POST_SIZE));
    }

    #[tokio::test]
    async fn test_multipart_missing_boundary() {
        let err = decode_bytes(Some("multipart/form-data"), b"anything").await.unwrap_err();
        assert!(matches!(err, BodyError::MissingBoundary));
    }

    #[tokio::test]
    async fn test_multipart_part_without_name_is_malformed() {
        let body = format!("--{BOUNDARY}\r\nContent-Type: text/plain\r\n\r\nhello\r\n--{BOUNDARY}--\r\n");
        let err = decode_bytes(Some(&multipart_content_type()), body.as_bytes()).await.unwrap_err();
        assert!(matches!(err, BodyError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_multipart_early_end_keeps_complete_parts() {
        let mut body = multipart_body(&[("first", b"1"), ("second", b"2")]);
        // Cut inside the second part's data.
        let cut = body.len() - format!("2\r\n--{BOUNDARY}--\r\n").len() + 1;
        body.truncate(cut);
        let decoded = decode_bytes(Some(&multipart_content_type()), &body).await.unwrap();

        let parts = decoded.as_multipart().unwrap();
        assert_eq!(parts.value_count(), 1);
        assert_eq!(parts.get("first").unwrap(), b"1");
    }

    #[tokio::test]
    async fn test_multipart_preamble_is_skipped() {
        let mut body = b"this is a preamble\r\n".to_vec();
        body.extend(multipart_body(&[("a", b"b")]));
        let decoded = decode_bytes(Some(&multipart_content_type()), &body).await.unwrap();

        assert_eq!(decoded.as_multipart().unwrap().get("a").unwrap(), b"b");
    }

    #[tokio::test]
    async fn test_read_timeout() {
        let (_writer, mut reader) = tokio::io::duplex(64);
        let err = decode(None, &mut reader, Duration::from_millis(20)).await.unwrap_err();
        assert!(matches!(err, BodyError::TimedOut));
    }

    #[test]
    fn test_decoded_body_accessors() {
        let body = DecodedBody::Form(StringMultiMap::new());
        assert!(body.as_form().is_some());
        assert!(body.as_raw().is_none());
        assert!(body.as_multipart().is_none());
        assert_eq!(DecodedBody::default(), DecodedBody::None);
    }
}
