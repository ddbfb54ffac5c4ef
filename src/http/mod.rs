//! HTTP message values exchanged with the kernel
//!
//! These are plain data: the kernel reads a `Request` and produces a
//! `Response`, and neither holds on to the other after a call.

pub mod cookie;

pub use self::cookie::Cookie;

use serde::ser::{Serialize, SerializeMap, Serializer};
use url::Url;

use std::borrow::Cow;
use std::collections::hash_map::{self, Entry};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

/// A map of HTTP headers
///
/// Keys are case-normalized on input. The first word, and any words after a
/// hyphen, are capitalized, with all other letters lowercased. A name may
/// carry several values; they are kept in the order they were added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    map: HashMap<String, Vec<String>>,
}

pub fn normalize_header_name(name: &str) -> String {
    let mut normalized = String::with_capacity(name.len());
    let mut start_of_word = true;

    for ch in name.chars() {
        if start_of_word {
            normalized.push(ch.to_ascii_uppercase());
        } else {
            normalized.push(ch.to_ascii_lowercase());
        }
        start_of_word = ch == '-';
    }

    normalized
}

impl HeaderMap {
    pub fn new() -> HeaderMap {
        HeaderMap::default()
    }

    /// Sets `key` to exactly `value`, dropping anything previously stored.
    pub fn insert<V: Into<String>>(&mut self, key: &str, value: V) {
        self.map.insert(normalize_header_name(key), vec![value.into()]);
    }

    /// Adds `value` after any values already stored under `key`.
    pub fn append<V: Into<String>>(&mut self, key: &str, value: V) {
        match self.map.entry(normalize_header_name(key)) {
            Entry::Vacant(e) => {
                e.insert(vec![value.into()]);
            }
            Entry::Occupied(mut e) => e.get_mut().push(value.into()),
        }
    }

    /// The first value stored under `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.map
            .get(&normalize_header_name(key))
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn get_all(&self, key: &str) -> &[String] {
        self.map
            .get(&normalize_header_name(key))
            .map_or(&[][..], Vec::as_slice)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(&normalize_header_name(key))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> hash_map::Iter<'_, String, Vec<String>> {
        self.map.iter()
    }
}

impl<'a> IntoIterator for &'a HeaderMap {
    type Item = (&'a String, &'a Vec<String>);
    type IntoIter = hash_map::Iter<'a, String, Vec<String>>;

    fn into_iter(self) -> Self::IntoIter {
        self.map.iter()
    }
}

/// A request parameter or attribute
///
/// Backends only ever see strings, so the only structure kept is nesting:
/// a value is either a scalar or an ordered map of further values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Scalar(String),
    Map(Vec<(String, Value)>),
}

impl Value {
    pub fn map<K, V, I>(entries: I) -> Value
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Flattens this value into form fields, PHP style: nested keys are
    /// appended in brackets, so `a => {b => c}` becomes `a[b]=c`.
    pub fn flatten_into(&self, name: &str, fields: &mut Vec<(String, String)>) {
        match self {
            Value::Scalar(s) => fields.push((name.to_owned(), s.clone())),
            Value::Map(entries) => {
                for (key, value) in entries {
                    value.flatten_into(&format!("{}[{}]", name, key), fields);
                }
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::Scalar(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::Scalar(s)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Scalar(s) => serializer.serialize_str(s),
            Value::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

/// Serializes an ordered list of named values as one JSON object.
pub struct ValueList<'a>(pub &'a [(String, Value)]);

impl Serialize for ValueList<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Where an uploaded file's bytes live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    Memory(Vec<u8>),
    Path(PathBuf),
}

/// A file uploaded with a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Form field the file was sent under
    pub field: String,
    /// File name as reported by the client
    pub filename: String,
    /// Declared media type, if the client sent one
    pub content_type: Option<String>,
    pub source: FileSource,
}

impl UploadedFile {
    pub fn from_bytes<F, N>(field: F, filename: N, content_type: Option<&str>, bytes: Vec<u8>) -> UploadedFile
    where
        F: Into<String>,
        N: Into<String>,
    {
        UploadedFile {
            field: field.into(),
            filename: filename.into(),
            content_type: content_type.map(str::to_owned),
            source: FileSource::Memory(bytes),
        }
    }

    /// An upload backed by a file on disk. The client filename is the
    /// path's last component.
    pub fn from_path<F, P>(field: F, path: P, content_type: Option<&str>) -> UploadedFile
    where
        F: Into<String>,
        P: Into<PathBuf>,
    {
        let path = path.into();
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        UploadedFile {
            field: field.into(),
            filename,
            content_type: content_type.map(str::to_owned),
            source: FileSource::Path(path),
        }
    }

    /// The declared content type, or one guessed from the filename.
    pub fn content_type(&self) -> String {
        match self.content_type {
            Some(ref declared) => declared.clone(),
            None => mime_guess::from_path(&self.filename)
                .first_or_octet_stream()
                .to_string(),
        }
    }

    pub fn contents(&self) -> io::Result<Cow<'_, [u8]>> {
        match self.source {
            FileSource::Memory(ref bytes) => Ok(Cow::Borrowed(bytes)),
            FileSource::Path(ref path) => fs::read(path).map(Cow::Owned),
        }
    }
}

/// An HTTP request to be handed to a FastCGI responder
#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    pub uri: Url,
    pub version: String,
    pub headers: HeaderMap,
    /// Cookies sent by the client, in order
    pub cookies: Vec<(String, String)>,
    /// Body parameters
    pub params: Vec<(String, Value)>,
    pub files: Vec<UploadedFile>,
    /// Values attached to the request by the caller rather than the client
    pub attributes: Vec<(String, Value)>,
    /// Raw request content, sent when there are no params or files
    pub content: Vec<u8>,
    pub remote_addr: SocketAddr,
}

impl Request {
    /// Builds a request for `uri`. Relative URIs are resolved against
    /// `http://localhost/`.
    pub fn create(method: &str, uri: &str) -> Result<Request, url::ParseError> {
        let uri = Url::parse("http://localhost/")?.join(uri)?;

        Ok(Request {
            method: method.to_owned(),
            uri,
            version: String::from("HTTP/1.1"),
            headers: HeaderMap::new(),
            cookies: Vec::new(),
            params: Vec::new(),
            files: Vec::new(),
            attributes: Vec::new(),
            content: Vec::new(),
            remote_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0),
        })
    }

    pub fn with_header<V: Into<String>>(mut self, name: &str, value: V) -> Request {
        self.headers.append(name, value);
        self
    }

    pub fn with_cookie<N: Into<String>, V: Into<String>>(mut self, name: N, value: V) -> Request {
        self.cookies.push((name.into(), value.into()));
        self
    }

    pub fn with_param<N: Into<String>, V: Into<Value>>(mut self, name: N, value: V) -> Request {
        self.params.push((name.into(), value.into()));
        self
    }

    pub fn with_file(mut self, file: UploadedFile) -> Request {
        self.files.push(file);
        self
    }

    pub fn with_attribute<N: Into<String>, V: Into<Value>>(mut self, name: N, value: V) -> Request {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn with_content<C: Into<Vec<u8>>>(mut self, content: C) -> Request {
        self.content = content.into();
        self
    }

    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Request {
        self.remote_addr = addr;
        self
    }
}

/// A response decoded from a FastCGI responder's output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    /// Reason phrase from the responder's `Status` header, if it sent one
    pub reason: Option<String>,
    pub headers: HeaderMap,
    /// Cookies set by the responder, in the order they were declared
    pub cookies: Vec<Cookie>,
    pub body: Vec<u8>,
}

impl Default for Response {
    fn default() -> Response {
        Response {
            status: 200,
            reason: None,
            headers: HeaderMap::new(),
            cookies: Vec::new(),
            body: Vec::new(),
        }
    }
}

impl Response {
    pub fn reason_phrase(&self) -> &str {
        match self.reason {
            Some(ref reason) if !reason.is_empty() => reason,
            _ => canonical_reason(self.status),
        }
    }
}

/// The registered reason phrase for the common status codes
pub fn canonical_reason(status: u16) -> &'static str {
    match status {
        100 => "Continue",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        206 => "Partial Content",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        410 => "Gone",
        413 => "Payload Too Large",
        415 => "Unsupported Media Type",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "Unknown",
    }
}
