//! Building the CGI environment for a request
//!
//! The responder sees the request only through its meta-variables and
//! FCGI_STDIN. `encode` computes both: the variables describe the script to
//! run, the client and the body, and the body is built from the request's
//! uploads, parameters or raw content, in that order of preference.

use crate::cgi::multipart::Multipart;
use crate::cgi::{Params, RequestBody};
use crate::errors::{Error, Result};
use crate::filesystem::{normalize_path, percent_decode};
use crate::http::cookie::cookie_header;
use crate::http::{Request, Value, ValueList};

use log::debug;
use url::form_urlencoded;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};

/// What we call ourselves in `SERVER_SOFTWARE`
pub const SERVER_SOFTWARE: &str = concat!("fcgi-http-kernel/", env!("CARGO_PKG_VERSION"));

/// Which script a request runs, and the path left over for it
#[derive(Debug, PartialEq, Eq)]
pub struct Script {
    /// Absolute path of the script on disk
    pub filename: PathBuf,
    /// URI path of the script, always starting with `'/'`
    pub name: String,
    /// Request path left over after the script name
    pub path_info: String,
}

/// Resolves the script for a request path.
///
/// A path naming an existing file runs that file. Any other path runs the
/// front controller, if there is one, with the whole path as path info.
/// Without a front controller the missing path is passed along as is, and
/// the responder gets to say it isn't there.
pub fn resolve_script(request_path: &str, document_root: &Path, front_controller: Option<&str>) -> Result<Script> {
    let relative = String::from_utf8_lossy(&normalize_path(request_path.as_bytes())?).into_owned();

    if Path::new(&relative)
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
    {
        return Err(Error::PathTraversal);
    }

    let requested = document_root.join(&relative);
    if !relative.is_empty() && requested.is_file() {
        return Ok(Script {
            filename: requested,
            name: format!("/{}", relative),
            path_info: String::new(),
        });
    }

    match front_controller {
        Some(controller) => {
            let controller = controller.trim_start_matches('/');
            Ok(Script {
                filename: document_root.join(controller),
                name: format!("/{}", controller),
                path_info: format!("/{}", relative),
            })
        }
        None => Ok(Script {
            filename: requested,
            name: format!("/{}", relative),
            path_info: String::new(),
        }),
    }
}

/// Turns a header name into its meta-variable suffix: uppercased, with
/// anything but letters and digits replaced by `'_'`.
pub fn meta_variable_name(name: &str) -> String {
    name.chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch.to_ascii_uppercase() } else { '_' })
        .collect()
}

/// Builds the meta-variables and body for `request`.
pub fn encode(request: &Request, document_root: &Path, front_controller: Option<&str>) -> Result<(Params, RequestBody)> {
    let body = encode_body(request)?;
    let script = resolve_script(request.uri.path(), document_root, front_controller)?;
    debug!("{} {} runs {:?}", request.method, request.uri, script);

    let mut params = Params::new();
    let mut set = |name: &str, value: String| {
        params.insert(name.to_owned(), value);
    };

    let uri = &request.uri;
    let query = uri.query().unwrap_or("");
    let request_uri = match uri.query() {
        Some(query) => format!("{}?{}", uri.path(), query),
        None => uri.path().to_owned(),
    };

    set("GATEWAY_INTERFACE", String::from("FastCGI/1.0"));
    set("SERVER_SOFTWARE", String::from(SERVER_SOFTWARE));
    set("SERVER_PROTOCOL", request.version.clone());
    set("REQUEST_METHOD", request.method.clone());
    set("REQUEST_URI", request_uri);
    set("QUERY_STRING", query.to_owned());
    set("DOCUMENT_ROOT", document_root.display().to_string());
    set("SCRIPT_FILENAME", script.filename.display().to_string());
    set("SCRIPT_NAME", script.name.clone());
    set("PATH_INFO", script.path_info.clone());
    set("PHP_SELF", format!("{}{}", script.name, script.path_info));
    if !script.path_info.is_empty() {
        set(
            "PATH_TRANSLATED",
            document_root
                .join(script.path_info.trim_start_matches('/'))
                .display()
                .to_string(),
        );
    }
    // php-cgi refuses to run without this when built with force-cgi-redirect
    set("REDIRECT_STATUS", String::from("200"));

    let (server_name, server_port) = server_name_and_port(request);
    set("SERVER_NAME", server_name);
    set("SERVER_PORT", server_port.to_string());
    if uri.scheme() == "https" {
        set("HTTPS", String::from("on"));
    }

    set("REMOTE_ADDR", request.remote_addr.ip().to_string());
    set("REMOTE_PORT", request.remote_addr.port().to_string());

    set("CONTENT_TYPE", body.content_type().unwrap_or_default());
    set("CONTENT_LENGTH", body.len().to_string());

    // Distinct names such as `X-A` and `X_A` share a variable; their values
    // are joined in name order.
    let mut forwarded: BTreeMap<String, Vec<(&str, String)>> = BTreeMap::new();
    for (name, values) in &request.headers {
        if name.eq_ignore_ascii_case("Content-Type") || name.eq_ignore_ascii_case("Content-Length") {
            continue;
        }
        forwarded
            .entry(meta_variable_name(name))
            .or_default()
            .push((name.as_str(), values.join(", ")));
    }
    for (variable, mut sources) in forwarded {
        if sources.len() > 1 {
            sources.sort();
            debug!(
                "Headers {:?} all map to HTTP_{}; joining them",
                sources.iter().map(|(name, _)| *name).collect::<Vec<_>>(),
                variable
            );
        }
        let joined: Vec<String> = sources.into_iter().map(|(_, value)| value).collect();
        set(&format!("HTTP_{}", variable), joined.join(", "));
    }

    if !request.headers.contains("Host") {
        if let Some(host) = uri.host_str() {
            let host = match uri.port() {
                Some(port) => format!("{}:{}", host, port),
                None => host.to_owned(),
            };
            set("HTTP_HOST", host);
        }
    }

    if !request.cookies.is_empty() {
        let cookies = request.cookies.iter().map(|(n, v)| (n.as_str(), v.as_str()));
        set("HTTP_COOKIE", cookie_header(cookies));
    }

    if !uri.username().is_empty() || uri.password().is_some() {
        let user = decode_userinfo(uri.username());
        set("AUTH_TYPE", String::from("Basic"));
        set("REMOTE_USER", user.clone());
        set("PHP_AUTH_USER", user);
        set("PHP_AUTH_PW", decode_userinfo(uri.password().unwrap_or("")));
    }

    let mut attribute_variables = BTreeSet::new();
    for (name, value) in &request.attributes {
        let variable = format!("ATTRIBUTE_{}", meta_variable_name(name));
        if !attribute_variables.insert(variable.clone()) {
            debug!("Attribute {:?} maps to {}, which is already set; skipping it", name, variable);
            continue;
        }
        let encoded = match value {
            Value::Scalar(s) => s.clone(),
            nested => serde_json::to_string(nested)?,
        };
        set(&variable, encoded);
    }
    if !request.attributes.is_empty() {
        set("REQUEST_ATTRIBUTES", serde_json::to_string(&ValueList(&request.attributes))?);
    }

    Ok((params, body))
}

/// `SERVER_NAME` and `SERVER_PORT`, preferring what the client put in `Host`
fn server_name_and_port(request: &Request) -> (String, u16) {
    let default_port = request.uri.port_or_known_default().unwrap_or(80);

    if let Some(host) = request.headers.get("Host") {
        // Bracketed IPv6 literals contain colons of their own
        let port_separator = match host.rfind(']') {
            Some(bracket) => host[bracket..].find(':').map(|i| i + bracket),
            None => host.rfind(':'),
        };

        return match port_separator {
            Some(i) => match host[i + 1..].parse() {
                Ok(port) => (host[..i].to_owned(), port),
                Err(_) => (host[..i].to_owned(), default_port),
            },
            None => (host.to_owned(), default_port),
        };
    }

    (request.uri.host_str().unwrap_or("").to_owned(), default_port)
}

fn decode_userinfo(part: &str) -> String {
    match percent_decode(part.as_bytes()) {
        Ok(decoded) => String::from_utf8_lossy(&decoded).into_owned(),
        Err(_) => part.to_owned(),
    }
}

fn encode_body(request: &Request) -> Result<RequestBody> {
    let mut fields = Vec::new();
    for (name, value) in &request.params {
        value.flatten_into(name, &mut fields);
    }

    if !request.files.is_empty() {
        let mut multipart = Multipart::new();
        for (name, value) in &fields {
            multipart.field(name, value);
        }
        for file in &request.files {
            let contents = file.contents().map_err(|source| Error::Upload {
                filename: file.filename.clone(),
                source,
            })?;
            multipart.file(&file.field, &file.filename, &file.content_type(), &contents);
        }

        return Ok(multipart.finish());
    }

    if !fields.is_empty() {
        let encoded = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&fields)
            .finish();
        return Ok(RequestBody::UrlEncoded(encoded.into_bytes()));
    }

    if !request.content.is_empty() {
        return Ok(RequestBody::Raw {
            content_type: request.headers.get("Content-Type").map(str::to_owned),
            data: request.content.clone(),
        });
    }

    Ok(RequestBody::Empty)
}
