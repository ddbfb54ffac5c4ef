//! Parsers for CGI/1.1 responses

use crate::cgi::{Header, Status};

use nom::bytes::complete::{tag, take_till, take_till1, take_while_m_n};
use nom::character::complete::{line_ending, space0, space1};
use nom::character::is_digit;
use nom::combinator::{all_consuming, map_res, opt, rest};
use nom::multi::separated_list0;
use nom::sequence::{preceded, terminated};
use nom::IResult;

use std::str::{self, FromStr};

fn cr_or_lf(x: u8) -> bool {
    x == b'\n' || x == b'\r'
}

fn is_colon_or_newline(x: u8) -> bool {
    x == b':' || cr_or_lf(x)
}

fn trim(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);

    &bytes[start..end]
}

/// A single `Name: content` line, without its line ending
pub fn header(input: &[u8]) -> IResult<&[u8], Header> {
    let (input, name) = take_till1(is_colon_or_newline)(input)?;
    let (input, _) = tag(":")(input)?;
    let (input, content) = take_till(cr_or_lf)(input)?;

    Ok((input, Header {
        name: trim(name).to_vec(),
        content: trim(content).to_vec(),
    }))
}

/// A whole header block: header lines separated by line endings, with an
/// optional trailing line ending. Fails unless all input is consumed.
pub fn header_block(input: &[u8]) -> IResult<&[u8], Vec<Header>> {
    all_consuming(terminated(
        separated_list0(line_ending, header),
        opt(line_ending),
    ))(input)
}

fn code(input: &[u8]) -> IResult<&[u8], u16> {
    map_res(
        map_res(take_while_m_n(3, 3, is_digit), str::from_utf8),
        FromStr::from_str,
    )(input)
}

/// The content of a `Status` header: a three digit code and an optional
/// reason phrase
pub fn status(input: &[u8]) -> IResult<&[u8], Status> {
    let (input, _) = space0(input)?;
    let (input, code) = code(input)?;
    let (input, phrase) = opt(preceded(space1, rest))(input)?;

    Ok((input, Status {
        code,
        reason_phrase: phrase.map(|p| trim(p).to_vec()).unwrap_or_default(),
    }))
}

/// Splits a response document into its header block and body.
///
/// The header block ends at the first blank line: the first `CRLF CRLF`, or
/// `LF LF` from responders that don't bother with carriage returns,
/// whichever comes first. Anything after that, including further blank
/// lines, is body. A document that opens with a line ending has no headers,
/// and a document without any blank line is all headers.
pub fn split_document(document: &[u8]) -> (&[u8], &[u8]) {
    if document.starts_with(b"\r\n") {
        return (&[][..], &document[2..]);
    }
    if document.starts_with(b"\n") {
        return (&[][..], &document[1..]);
    }

    for i in 0..document.len() {
        if document[i..].starts_with(b"\r\n\r\n") {
            return (&document[..i], &document[i + 4..]);
        }
        if document[i..].starts_with(b"\n\n") {
            return (&document[..i], &document[i + 2..]);
        }
    }

    (document, &[][..])
}

#[cfg(test)]
mod test {
    use super::*;

    fn hdr(name: &str, content: &str) -> Header {
        Header {
            name: Vec::from(name.as_bytes()),
            content: Vec::from(content.as_bytes()),
        }
    }

    #[test]
    fn header_works() {
        let input: &[u8] = b"Foo: bar\r\n\r\n";

        let (rest, res) = header(input).unwrap();
        assert_eq!(hdr("Foo", "bar"), res);
        assert_eq!(b"\r\n\r\n", rest);
    }

    #[test]
    fn header_splits_on_first_colon_and_trims() {
        let (_, res) = header(b"Location :  http://example.com/a:b  ").unwrap();
        assert_eq!(hdr("Location", "http://example.com/a:b"), res);
    }

    #[test]
    fn header_empty_content() {
        let (_, res) = header(b"X-Empty:").unwrap();
        assert_eq!(hdr("X-Empty", ""), res);
    }

    #[test]
    fn header_without_colon_fails() {
        assert!(header(b"not a header").is_err());
        assert!(header(b": no name").is_err());
    }

    #[test]
    fn test_headers() {
        let input: &[u8] = b"Foo: bar\r\nBaz: buz\r\n";

        let (rest, hdrs) = header_block(input).unwrap();
        assert_eq!(vec![hdr("Foo", "bar"), hdr("Baz", "buz")], hdrs);
        assert_eq!(b"", rest);
    }

    #[test]
    fn header_block_accepts_bare_newlines() {
        let (_, hdrs) = header_block(b"Foo: bar\nBaz: buz").unwrap();
        assert_eq!(vec![hdr("Foo", "bar"), hdr("Baz", "buz")], hdrs);
    }

    #[test]
    fn header_block_rejects_garbage_lines() {
        assert!(header_block(b"Foo: bar\r\ngarbage\r\n").is_err());
    }

    #[test]
    fn empty_header_block() {
        let (_, hdrs) = header_block(b"").unwrap();
        assert!(hdrs.is_empty());
    }

    #[test]
    fn status_with_reason() {
        let (_, status) = status(b"404 Not Found").unwrap();
        assert_eq!(status, Status {
            code: 404,
            reason_phrase: Vec::from(&b"Not Found"[..]),
        });
    }

    #[test]
    fn status_without_reason() {
        let (_, status) = status(b"500").unwrap();
        assert_eq!(status.code, 500);
        assert!(status.reason_phrase.is_empty());
    }

    #[test]
    fn status_must_be_numeric() {
        assert!(status(b"OK").is_err());
        assert!(status(b"5x0 Broken").is_err());
    }

    #[test]
    fn split_keeps_later_blank_lines_in_body() {
        let (head, body) = split_document(b"Content-Type: text/plain\r\n\r\nfoo\r\n\r\nbar");
        assert_eq!(head, b"Content-Type: text/plain");
        assert_eq!(body, b"foo\r\n\r\nbar");
    }

    #[test]
    fn split_without_blank_line_is_all_head() {
        let (head, body) = split_document(b"Location: /foo.php\r\n");
        assert_eq!(head, b"Location: /foo.php\r\n");
        assert_eq!(body, b"");
    }

    #[test]
    fn split_leading_blank_line_means_no_headers() {
        let (head, body) = split_document(b"\r\nbody\r\n\r\n");
        assert_eq!(head, b"");
        assert_eq!(body, b"body\r\n\r\n");
    }

    #[test]
    fn split_lf_only() {
        let (head, body) = split_document(b"Status: 200 OK\nX-A: b\n\nhello");
        assert_eq!(head, b"Status: 200 OK\nX-A: b");
        assert_eq!(body, b"hello");
    }

    #[test]
    fn doc_headers_on_captured_traffic() {
        let input: &[u8] = b"Status: 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nDate: Thu, 07 Apr 2016 20:42:43 GMT\r\n\r\n<!DOCTYPE html>\n<html>\n<blockquote>New\r\nLines\r\n\r\nAre\r\nGreat!</blockquote>\n</html>\n";

        let (head, body) = split_document(input);
        let (_, hdrs) = header_block(head).unwrap();

        assert_eq!(hdrs, vec![
            hdr("Status", "200 OK"),
            hdr("Content-Type", "text/html; charset=utf-8"),
            hdr("Date", "Thu, 07 Apr 2016 20:42:43 GMT"),
        ]);
        assert!(body.starts_with(b"<!DOCTYPE html>"));
        assert!(body.ends_with(b"Great!</blockquote>\n</html>\n"));
    }
}
