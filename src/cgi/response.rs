//! Decoding responder output into HTTP responses

use crate::cgi::parser::{header_block, split_document, status};
use crate::cgi::Header;
use crate::errors::{Error, Result};
use crate::http::{Cookie, Response};
use crate::log_util::ascii_escape;

use log::warn;

/// Status used when the responder sends `Location` without `Status`
const REDIRECT_STATUS: u16 = 302;

/// Decodes the raw output of a responder.
///
/// Empty output is a valid, empty `200` response. Everything up to the first
/// blank line is headers; everything after is body, passed through as is.
pub fn decode(raw: &[u8]) -> Result<Response> {
    let mut response = Response::default();
    if raw.is_empty() {
        return Ok(response);
    }

    let (head, body) = split_document(raw);
    let headers = match header_block(head) {
        Ok((_, headers)) => headers,
        Err(_) => {
            return Err(Error::MalformedResponse(format!(
                "unparseable header block \"{}\"",
                ascii_escape(head)
            )))
        }
    };

    let mut explicit_status = false;
    for Header { name, content } in headers {
        let name = header_name(&name)?;
        let content = String::from_utf8_lossy(&content);

        if name.eq_ignore_ascii_case("Status") {
            match status(content.as_bytes()) {
                Ok((_, parsed)) => {
                    response.status = parsed.code;
                    if !parsed.reason_phrase.is_empty() {
                        response.reason = Some(String::from_utf8_lossy(&parsed.reason_phrase).into_owned());
                    }
                    explicit_status = true;
                }
                Err(_) => warn!("Ignoring Status header without a code: {:?}", content),
            }
        } else if name.eq_ignore_ascii_case("Set-Cookie") {
            match Cookie::parse(&content) {
                Some(cookie) => response.cookies.push(cookie),
                None => warn!("Skipping unparseable cookie {:?}", content),
            }
        } else {
            response.headers.append(name, content.into_owned());
        }
    }

    if !explicit_status && response.headers.contains("Location") {
        response.status = REDIRECT_STATUS;
    }

    response.body = body.to_vec();
    Ok(response)
}

/// Header names have to be visible ASCII; anything else means we're not
/// looking at a header block.
fn header_name(name: &[u8]) -> Result<&str> {
    if name.iter().all(|b| b.is_ascii_graphic()) {
        // all-ASCII input is valid UTF-8
        std::str::from_utf8(name).map_err(|_| Error::MalformedResponse(String::from("bad header name")))
    } else {
        Err(Error::MalformedResponse(format!(
            "bad header name \"{}\"",
            ascii_escape(name)
        )))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn plain_document() {
        let response = decode(b"Content-type: text/html\r\n\r\nHello World").unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.headers.get("Content-Type"), Some("text/html"));
        assert_eq!(response.body, b"Hello World");
    }

    #[test]
    fn status_header_sets_status() {
        let response = decode(b"Status: 500 Internal Server Error\r\nContent-type: text/html\r\n\r\nOops").unwrap();

        assert_eq!(response.status, 500);
        assert_eq!(response.reason.as_deref(), Some("Internal Server Error"));
        assert!(!response.headers.contains("Status"));
        assert_eq!(response.body, b"Oops");
    }

    #[test]
    fn location_alone_redirects() {
        let response = decode(b"Location: /foo.php\r\n\r\n").unwrap();

        assert_eq!(response.status, 302);
        assert_eq!(response.headers.get("Location"), Some("/foo.php"));
        assert!(response.body.is_empty());
    }

    #[test]
    fn explicit_status_beats_location() {
        let response = decode(b"Status: 301 Moved Permanently\r\nLocation: /new\r\n\r\n").unwrap();
        assert_eq!(response.status, 301);
    }

    #[test]
    fn double_crlf_inside_body_is_preserved() {
        let response = decode(b"Content-Type: text/plain\r\n\r\nfoo\r\n\r\nbar").unwrap();
        assert_eq!(response.body, b"foo\r\n\r\nbar");
    }

    #[test]
    fn repeated_headers_accumulate() {
        let response = decode(b"X-Thing: one\r\nx-thing: two\r\n\r\n").unwrap();
        assert_eq!(response.headers.get_all("X-Thing"), &["one", "two"]);
    }

    #[test]
    fn cookies_are_diverted_in_order() {
        let response = decode(b"Set-Cookie: foo=baz\r\nContent-Type: text/html\r\nSet-Cookie: qux=quux\r\n\r\n").unwrap();

        assert!(!response.headers.contains("Set-Cookie"));
        assert_eq!(response.cookies.len(), 2);
        assert_eq!((response.cookies[0].name.as_str(), response.cookies[0].value.as_str()), ("foo", "baz"));
        assert_eq!((response.cookies[1].name.as_str(), response.cookies[1].value.as_str()), ("qux", "quux"));
    }

    #[test]
    fn full_cookie() {
        let response = decode(
            b"Set-Cookie: foo=bar; expires=Thu, 25-Oct-2012 12:00:00 GMT; path=/baz; domain=example.com\r\n\r\n",
        )
        .unwrap();

        let cookie = &response.cookies[0];
        assert_eq!(cookie.name, "foo");
        assert_eq!(cookie.value, "bar");
        assert_eq!(cookie.expires, Some(1351166400));
        assert_eq!(cookie.path.as_deref(), Some("/baz"));
        assert_eq!(cookie.domain.as_deref(), Some("example.com"));
    }

    #[test]
    fn empty_cookie_value() {
        let response = decode(b"Set-Cookie: foo=\r\n\r\n").unwrap();
        assert_eq!(response.cookies[0].name, "foo");
        assert_eq!(response.cookies[0].value, "");
    }

    #[test]
    fn broken_cookie_is_skipped() {
        let response = decode(b"Set-Cookie: garbage\r\nSet-Cookie: ok=1\r\n\r\n").unwrap();
        assert_eq!(response.cookies, vec![Cookie::new("ok", "1")]);
    }

    #[test]
    fn empty_output_is_an_empty_response() {
        let response = decode(b"").unwrap();
        assert_eq!(response.status, 200);
        assert!(response.headers.is_empty());
        assert!(response.body.is_empty());
    }

    #[test]
    fn headers_with_empty_body() {
        let response = decode(b"X-Powered-By: PHP\r\nContent-type: text/html\r\n\r\n").unwrap();
        assert_eq!(response.status, 200);
        assert!(response.body.is_empty());
    }

    #[test]
    fn binary_body_passes_through() {
        let mut raw = b"Content-Type: image/gif\r\n\r\n".to_vec();
        raw.extend_from_slice(&[0x47, 0x49, 0x46, 0x00, 0xff, 0x0d, 0x0a]);

        let response = decode(&raw).unwrap();
        assert_eq!(response.body, [0x47, 0x49, 0x46, 0x00, 0xff, 0x0d, 0x0a]);
    }

    #[test]
    fn garbage_is_malformed() {
        match decode(b"this is not a header\r\n\r\nbody") {
            Err(Error::MalformedResponse(_)) => (),
            other => panic!("{:?}", other),
        }
    }

    #[test]
    fn non_numeric_status_is_ignored() {
        let response = decode(b"Status: OK\r\nContent-type: text/plain\r\n\r\nfine").unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.reason, None);
        assert_eq!(response.headers.get("Content-Type"), Some("text/plain"));
        assert_eq!(response.body, b"fine");

        let response = decode(b"Status: moved\r\nLocation: /elsewhere\r\n\r\n").unwrap();
        assert_eq!(response.status, 302);
    }

    #[test]
    fn header_name_with_spaces_is_malformed() {
        assert!(decode(b"Bad Name: x\r\n\r\n").is_err());
    }
}
