//! A minimal HTTP/1.1 front end for the kernel
//!
//! Every connection carries exactly one request and is served on a thread of
//! its own. Responses are always written whole, with a `Content-Length`, and
//! the connection is closed afterwards.

use crate::config::Config;
use crate::errors::{Error, Result};
use crate::fastcgi::Client;
use crate::http::{canonical_reason, cookie::parse_cookie_header, Request, Response};
use crate::kernel::{Invoker, Kernel};

use log::{error, info, warn};

use std::fs::canonicalize;
use std::io::{BufWriter, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Largest request head we are willing to buffer
const MAX_HEAD_LEN: usize = 64 * 1024;

/// Largest request body we are willing to buffer
const MAX_BODY_LEN: usize = 32 * 1024 * 1024;

/// Binds the configured port and serves requests through the configured
/// FastCGI responder until the listener fails.
pub fn serve(config: Config) -> Result<()> {
    let kernel = Arc::new(kernel_from_config(&config)?);
    let listener = TcpListener::bind(("0.0.0.0", config.port))?;

    info!(
        "Serving {} through {} on port {}",
        kernel.document_root().display(),
        config.fcgi.address,
        config.port
    );

    run(listener, kernel)
}

pub fn kernel_from_config(config: &Config) -> Result<Kernel<Client>> {
    let document_root = canonicalize(&config.kernel.document_root)?;

    let mut client = Client::new(config.fcgi.address.clone());
    if let Some(timeout) = config.fcgi.timeout {
        client = client.with_timeout(timeout);
    }

    let kernel = Kernel::new(client, document_root);
    Ok(match config.kernel.front_controller {
        Some(ref script) => kernel.with_front_controller(script.clone()),
        None => kernel,
    })
}

/// Accepts connections on `listener` forever.
pub fn run<I>(listener: TcpListener, kernel: Arc<Kernel<I>>) -> Result<()>
where
    I: Invoker + Send + Sync + 'static,
{
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let kernel = Arc::clone(&kernel);
                thread::spawn(move || {
                    if let Err(e) = handle_connection(stream, &kernel) {
                        warn!("Connection failed: {}", e);
                    }
                });
            }
            Err(e) => {
                warn!("Failed connection: {}", e);
            }
        };
    }

    Ok(())
}

fn handle_connection<I: Invoker>(stream: TcpStream, kernel: &Kernel<I>) -> Result<()> {
    stream.set_read_timeout(Some(Duration::new(5, 0)))?;
    stream.set_write_timeout(Some(Duration::new(5, 0)))?;

    let peer_addr = stream.peer_addr()?;
    let local_port = stream.local_addr()?.port();
    let mut writer = BufWriter::new(stream.try_clone()?);

    let request = match read_request(stream, peer_addr, local_port) {
        Ok(request) => request,
        Err(Error::Io(e)) => return Err(Error::Io(e)),
        Err(Error::BodyTooLarge) => {
            warn!("Refusing an oversized body from {}", peer_addr);
            return error_messages::error_413(&mut writer);
        }
        Err(e) => {
            warn!("Bad request from {}: {}", peer_addr, e);
            return error_messages::error_400(&mut writer);
        }
    };

    let response = match kernel.handle(&request) {
        Ok(response) => response,
        Err(Error::PathTraversal) => {
            warn!("Refusing {} from {}: escapes the document root", request.uri, peer_addr);
            return error_messages::error_403(&mut writer);
        }
        Err(e @ Error::IllegalPercentEncoding) | Err(e @ Error::PathNotInOriginForm) => {
            warn!("Bad request from {}: {}", peer_addr, e);
            return error_messages::error_400(&mut writer);
        }
        Err(e @ Error::Transport(_)) | Err(e @ Error::MalformedResponse(_)) => {
            error!("{} {}: {}", request.method, request.uri, e);
            return error_messages::error_502(&mut writer);
        }
        Err(e) => {
            error!("{} {}: {}", request.method, request.uri, e);
            return error_messages::error_500(&mut writer);
        }
    };

    write_response(&mut writer, &response, request.method != "HEAD")
}

/// The parts of a request head we care about
#[derive(Debug)]
struct Head {
    method: String,
    path: String,
    version: u8,
    headers: Vec<(String, String)>,
}

/// Reads a request head off `source`
///
/// Returns the head and whatever was read past it, which is the start of the
/// body.
fn parse_head<R: Read>(mut source: R) -> Result<(Head, Vec<u8>)> {
    let mut buffer = Vec::with_capacity(4096);
    let mut chunk = [0; 4096];

    loop {
        let mut headers = [httparse::EMPTY_HEADER; 100];
        let mut req = httparse::Request::new(&mut headers);

        if let httparse::Status::Complete(bytes) = req.parse(&buffer)? {
            let head = Head {
                method: String::from(req.method.unwrap_or_default()),
                path: String::from(req.path.unwrap_or_default()),
                version: req.version.unwrap_or(1),
                headers: req
                    .headers
                    .iter()
                    .map(|h| (String::from(h.name), String::from_utf8_lossy(h.value).into_owned()))
                    .collect(),
            };

            return Ok((head, buffer[bytes..].to_vec()));
        }

        if buffer.len() >= MAX_HEAD_LEN {
            return Err(Error::RequestTooLarge);
        }

        let read = source.read(&mut chunk)?;
        if read == 0 {
            return Err(Error::RequestIncomplete);
        }
        buffer.extend_from_slice(&chunk[..read]);
    }
}

/// Reads one complete request, body included
fn read_request<R: Read>(mut source: R, remote_addr: SocketAddr, local_port: u16) -> Result<Request> {
    let (head, mut content) = parse_head(&mut source)?;

    if !head.path.starts_with('/') {
        return Err(Error::PathNotInOriginForm);
    }

    let host = head
        .headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("Host"))
        .map(|(_, value)| value.clone())
        .unwrap_or_else(|| format!("localhost:{}", local_port));
    if !is_bare_authority(&host) {
        return Err(Error::InvalidHost(host));
    }

    let mut request = Request::create(&head.method, &format!("http://{}{}", host, head.path))?;
    request.version = format!("HTTP/1.{}", head.version);
    request.remote_addr = remote_addr;

    let mut content_length = 0;
    for (name, value) in head.headers {
        if name.eq_ignore_ascii_case("Transfer-Encoding") {
            return Err(Error::UnsupportedTransferEncoding);
        }
        if name.eq_ignore_ascii_case("Content-Length") {
            content_length = value.trim().parse().map_err(|_| Error::InvalidContentLength)?;
        }
        if name.eq_ignore_ascii_case("Cookie") {
            request.cookies.extend(parse_cookie_header(&value));
        }
        request.headers.append(&name, value);
    }

    if content_length > MAX_BODY_LEN {
        return Err(Error::BodyTooLarge);
    }

    if content.len() >= content_length {
        content.truncate(content_length);
    } else {
        let missing = (content_length - content.len()) as u64;
        let read = source.take(missing).read_to_end(&mut content)?;
        if (read as u64) < missing {
            return Err(Error::RequestIncomplete);
        }
    }
    request.content = content;

    Ok(request)
}

/// Whether a `Host` value is just a host and optional port. Anything that
/// would put userinfo, a path, a query or a fragment into the URI is refused.
fn is_bare_authority(host: &str) -> bool {
    !host.is_empty()
        && !host
            .chars()
            .any(|ch| ch.is_whitespace() || ch.is_control() || matches!(ch, '@' | '/' | '\\' | '?' | '#'))
}

fn write_response<W: Write>(writer: &mut W, response: &Response, with_body: bool) -> Result<()> {
    write!(writer, "HTTP/1.1 {} {}\r\n", response.status, response.reason_phrase())?;

    for (name, values) in &response.headers {
        if name == "Content-Length" || name == "Connection" || name == "Transfer-Encoding" {
            continue;
        }
        for value in values {
            write!(writer, "{}: {}\r\n", name, value)?;
        }
    }
    for cookie in &response.cookies {
        write!(writer, "Set-Cookie: {}\r\n", cookie)?;
    }
    write!(writer, "Content-Length: {}\r\nConnection: close\r\n\r\n", response.body.len())?;

    if with_body {
        writer.write_all(&response.body)?;
    }
    writer.flush()?;

    Ok(())
}

pub mod error_messages {
    use super::*;

    fn error_page<W: Write>(writer: &mut W, status: u16, page: &[u8]) -> Result<()> {
        let mut response = Response {
            status,
            reason: Some(String::from(canonical_reason(status))),
            body: Vec::from(page),
            ..Default::default()
        };
        response.headers.insert("Content-Type", "text/html");

        write_response(writer, &response, true)
    }

    pub fn error_500<W: Write>(writer: &mut W) -> Result<()> {
        error_page(writer, 500, ERROR_500)
    }

    const ERROR_500: &[u8] = b"<!doctype html><html><head><title>Error</title></head><body><h1>Internal Error</h1><p>Something went wrong on my side.</p><p>There's nothing you can do; maybe come back later.</p></body></html>";

    pub fn error_502<W: Write>(writer: &mut W) -> Result<()> {
        error_page(writer, 502, ERROR_502)
    }

    const ERROR_502: &[u8] = b"<!doctype html><html><head><title>Error</title></head><body><h1>Bad Gateway</h1><p>The application server didn't answer properly.</p></body></html>";

    pub fn error_403<W: Write>(writer: &mut W) -> Result<()> {
        error_page(writer, 403, ERROR_403)
    }

    const ERROR_403: &[u8] = b"<!doctype html><html><head><title>Error</title></head><body><h1>Forbidden</h1><p>You don't have permission to view that file. Sorry.</p></body></html>";

    pub fn error_413<W: Write>(writer: &mut W) -> Result<()> {
        error_page(writer, 413, ERROR_413)
    }

    const ERROR_413: &[u8] = b"<!doctype html><html><head><title>Error</title></head><body><h1>Payload Too Large</h1><p>That request body is more than I'm willing to hold on to.</p></body></html>";

    pub fn error_400<W: Write>(writer: &mut W) -> Result<()> {
        error_page(writer, 400, ERROR_400)
    }

    const ERROR_400: &[u8] = b"<!doctype html><html><head><title>Error</title></head><body><h1>Bad Request</h1><p>Your request had some kind of bad syntax. Are you using netcat?</p></body></html>";
}
