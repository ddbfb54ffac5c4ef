//! Cookies, in both directions
//!
//! Request cookies travel to the responder folded into one `Cookie` header;
//! cookies coming back arrive as `Set-Cookie` lines and are parsed into
//! `Cookie` values.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use log::debug;

use std::fmt;

/// A cookie set by the responder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    /// May be empty; `foo=` sets `foo` to the empty string.
    pub value: String,
    /// Absolute expiry, in seconds since the Unix epoch
    pub expires: Option<i64>,
    pub max_age: Option<i64>,
    pub path: Option<String>,
    pub domain: Option<String>,
    pub secure: bool,
    pub http_only: bool,
}

impl Cookie {
    pub fn new<N: Into<String>, V: Into<String>>(name: N, value: V) -> Cookie {
        Cookie {
            name: name.into(),
            value: value.into(),
            expires: None,
            max_age: None,
            path: None,
            domain: None,
            secure: false,
            http_only: false,
        }
    }

    /// Parses the value of a `Set-Cookie` header.
    ///
    /// Returns `None` when the leading `name=value` pair is missing or the
    /// name is empty. Attributes we don't know about are skipped, as are
    /// attributes whose values don't parse.
    pub fn parse(header: &str) -> Option<Cookie> {
        let mut segments = header.split(';');
        let (name, value) = segments.next()?.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        let mut cookie = Cookie::new(name, value.trim());

        for segment in segments {
            let (attribute, value) = match segment.split_once('=') {
                Some((attribute, value)) => (attribute.trim(), value.trim()),
                None => (segment.trim(), ""),
            };

            match attribute.to_ascii_lowercase().as_str() {
                "expires" => cookie.expires = parse_http_date(value),
                "max-age" => cookie.max_age = value.parse().ok(),
                "path" => cookie.path = Some(value.to_owned()),
                "domain" => cookie.domain = Some(value.to_owned()),
                "secure" => cookie.secure = true,
                "httponly" => cookie.http_only = true,
                "" => (),
                other => debug!("Ignoring cookie attribute {:?}", other),
            }
        }

        Some(cookie)
    }
}

/// Renders the cookie as a `Set-Cookie` header value.
impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)?;

        if let Some(date) = self.expires.and_then(format_http_date) {
            write!(f, "; expires={}", date)?;
        }
        if let Some(max_age) = self.max_age {
            write!(f, "; Max-Age={}", max_age)?;
        }
        if let Some(ref path) = self.path {
            write!(f, "; path={}", path)?;
        }
        if let Some(ref domain) = self.domain {
            write!(f, "; domain={}", domain)?;
        }
        if self.secure {
            f.write_str("; secure")?;
        }
        if self.http_only {
            f.write_str("; httponly")?;
        }

        Ok(())
    }
}

/// Folds request cookies into a single `Cookie` header value.
pub fn cookie_header<'a, I>(cookies: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    cookies
        .into_iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Splits a `Cookie` request header into name/value pairs.
pub fn parse_cookie_header(header: &str) -> Vec<(String, String)> {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                None
            } else {
                Some((name.to_owned(), value.trim().to_owned()))
            }
        })
        .collect()
}

/// Formats accepted for `expires`, most common first
const HTTP_DATE_FORMATS: &[&str] = &[
    // RFC 1123
    "%a, %d %b %Y %H:%M:%S GMT",
    // Netscape's cookie spec, still what PHP emits
    "%a, %d-%b-%Y %H:%M:%S GMT",
    // RFC 850
    "%A, %d-%b-%y %H:%M:%S GMT",
    // asctime()
    "%a %b %e %H:%M:%S %Y",
];

/// Parses an HTTP date into seconds since the Unix epoch.
pub fn parse_http_date(date: &str) -> Option<i64> {
    let date = date.trim();

    HTTP_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(date, format).ok())
        .map(|naive| Utc.from_utc_datetime(&naive).timestamp())
}

/// Formats seconds since the Unix epoch as an RFC 1123 date.
pub fn format_http_date(timestamp: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .map(|date| date.format("%a, %d %b %Y %H:%M:%S GMT").to_string())
}
