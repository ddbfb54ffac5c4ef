//! CGI/1.1 messages, in both directions
//!
//! FastCGI 1 inherits its message format and semantics from CGI/1.1: requests
//! are described by an environment of meta-variables plus a body, and
//! responses are a block of CGI headers followed by the document.

pub mod environment;
pub mod multipart;
pub mod parser;
pub mod response;

pub use self::environment::encode;
pub use self::response::decode;

use std::collections::BTreeMap;

/// Meta-variables handed to the responder
pub type Params = BTreeMap<String, String>;

/// A status line
#[derive(Debug, PartialEq, Eq)]
pub struct Status {
    pub code: u16,
    pub reason_phrase: Vec<u8>,
}

/// A response header
#[derive(Debug, PartialEq, Eq)]
pub struct Header {
    pub name: Vec<u8>,
    pub content: Vec<u8>,
}

/// The body sent to the responder on FCGI_STDIN
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    Empty,
    /// `application/x-www-form-urlencoded` parameters
    UrlEncoded(Vec<u8>),
    /// `multipart/form-data`, delimited by `boundary`
    Multipart { boundary: String, data: Vec<u8> },
    /// Request content passed through untouched
    Raw {
        content_type: Option<String>,
        data: Vec<u8>,
    },
}

impl RequestBody {
    pub fn content_type(&self) -> Option<String> {
        match *self {
            RequestBody::Empty => None,
            RequestBody::UrlEncoded(_) => Some(mime::APPLICATION_WWW_FORM_URLENCODED.to_string()),
            RequestBody::Multipart { ref boundary, .. } => {
                Some(format!("{}; boundary={}", mime::MULTIPART_FORM_DATA, boundary))
            }
            RequestBody::Raw { ref content_type, .. } => content_type.clone(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match *self {
            RequestBody::Empty => &[][..],
            RequestBody::UrlEncoded(ref data)
            | RequestBody::Multipart { ref data, .. }
            | RequestBody::Raw { ref data, .. } => data.as_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn content_types() {
        assert_eq!(RequestBody::Empty.content_type(), None);
        assert_eq!(
            RequestBody::UrlEncoded(b"a=b".to_vec()).content_type().as_deref(),
            Some("application/x-www-form-urlencoded")
        );
        assert_eq!(
            RequestBody::Multipart { boundary: String::from("xyz"), data: vec![] }.content_type().as_deref(),
            Some("multipart/form-data; boundary=xyz")
        );
        assert_eq!(
            RequestBody::Raw { content_type: None, data: b"raw".to_vec() }.content_type(),
            None
        );
    }

    #[test]
    fn lengths() {
        assert!(RequestBody::Empty.is_empty());
        assert_eq!(RequestBody::UrlEncoded(b"a=b".to_vec()).len(), 3);
    }
}
