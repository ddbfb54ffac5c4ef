//! A driver for FastCGI connections
//!
//! Every exchange gets a connection of its own: the request goes out as
//! request id 1 without FCGI_KEEP_CONN, and the responder closes the
//! connection once it has sent FCGI_END_REQUEST.

use crate::cgi::Params;
use crate::errors::TransportError;
use crate::fastcgi::parser::{self, RecordHeader};
use crate::fastcgi::serializer::{self, begin_request};
use crate::fastcgi::{
    protocol_status, record_kind, Content, EndRequest, NameValuePair, Record, Role, HEADER_LEN,
    VERSION,
};
use crate::kernel::Invoker;
use crate::log_util::{abbreviate, ascii_escape};

use log::{debug, warn};

use std::fmt;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::time::Duration;

type Result<T> = std::result::Result<T, TransportError>;

/// The only request id this driver ever uses
pub const REQUEST_ID: u16 = 1;

/// Where a FastCGI responder listens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    Tcp(SocketAddr),
    Unix(PathBuf),
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Address::Tcp(ref addr) => write!(f, "{}", addr),
            Address::Unix(ref path) => write!(f, "unix:{}", path.display()),
        }
    }
}

/// An open connection to a responder
enum Connection {
    Tcp(TcpStream),
    Unix(UnixStream),
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match *self {
            Connection::Tcp(ref mut s) => s.read(buf),
            Connection::Unix(ref mut s) => s.read(buf),
        }
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match *self {
            Connection::Tcp(ref mut s) => s.write(buf),
            Connection::Unix(ref mut s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match *self {
            Connection::Tcp(ref mut s) => s.flush(),
            Connection::Unix(ref mut s) => s.flush(),
        }
    }
}

/// A client for a FastCGI responder
///
/// A `Client` holds no connection between exchanges, so it can be shared
/// freely between threads.
#[derive(Debug, Clone)]
pub struct Client {
    address: Address,
    timeout: Option<Duration>,
}

impl Client {
    pub fn new(address: Address) -> Client {
        Client {
            address,
            timeout: None,
        }
    }

    /// Bounds connecting, and every read and write after that, by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Client {
        self.timeout = Some(timeout);
        self
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    fn connect(&self) -> Result<Connection> {
        match self.address {
            Address::Tcp(ref addr) => {
                let stream = match self.timeout {
                    Some(timeout) => TcpStream::connect_timeout(addr, timeout)?,
                    None => TcpStream::connect(addr)?,
                };
                stream.set_read_timeout(self.timeout)?;
                stream.set_write_timeout(self.timeout)?;
                stream.set_nodelay(true)?;
                Ok(Connection::Tcp(stream))
            }
            Address::Unix(ref path) => {
                let stream = UnixStream::connect(path)?;
                stream.set_read_timeout(self.timeout)?;
                stream.set_write_timeout(self.timeout)?;
                Ok(Connection::Unix(stream))
            }
        }
    }

    /// Runs one request and returns everything the responder wrote to
    /// FCGI_STDOUT.
    pub fn exchange(&self, params: &Params, body: &[u8]) -> Result<Vec<u8>> {
        debug!(
            "Sending {} params and {} body bytes to {}",
            params.len(),
            body.len(),
            self.address
        );

        let mut conn = self.connect()?;
        run_request(&mut conn, params, body)
    }

    /// Asks the responder about its capabilities with FCGI_GET_VALUES.
    pub fn get_values(&self, names: &[&[u8]]) -> Result<Vec<NameValuePair>> {
        let mut conn = self.connect()?;
        serializer::get_values(&mut conn, names)?;
        conn.flush()?;

        match read_record(&mut conn)? {
            Record {
                id: 0,
                content: Content::GetValuesResult(values),
            } => Ok(values),
            other => Err(TransportError::ProtocolViolation(format!(
                "expected FCGI_GET_VALUES_RESULT, got record type {} for request {}",
                other.kind(),
                other.id
            ))),
        }
    }
}

impl Invoker for Client {
    fn invoke(&self, params: &Params, body: &[u8]) -> Result<Vec<u8>> {
        self.exchange(params, body)
    }
}

/// Performs a complete Responder exchange over `stream`
pub fn run_request<S: Read + Write>(stream: &mut S, params: &Params, body: &[u8]) -> Result<Vec<u8>> {
    {
        let mut writer = BufWriter::new(&mut *stream);
        begin_request(&mut writer, REQUEST_ID, Role::Responder, 0)?;
        serializer::params(&mut writer, REQUEST_ID, params)?;
        serializer::stream(&mut writer, record_kind::STDIN, REQUEST_ID, body)?;
        writer.flush()?;
    }

    let mut reader = BufReader::new(stream);
    let mut stdout = Vec::new();
    loop {
        let record = read_record(&mut reader)?;
        if record.id != REQUEST_ID {
            warn!("Found a message for request {}; this is request {}", record.id, REQUEST_ID);
            return Err(TransportError::ProtocolViolation(format!(
                "record for unknown request {}",
                record.id
            )));
        }

        match record.content {
            Content::Stdout(content) => stdout.extend_from_slice(&content),
            Content::Stderr(content) => {
                if !content.is_empty() {
                    warn!("Error message from responder: \"{}\"", ascii_escape(&content));
                }
            }
            Content::EndRequest(EndRequest {
                app_status,
                protocol_status,
            }) => {
                if protocol_status != protocol_status::REQUEST_COMPLETE {
                    return Err(TransportError::Rejected(protocol_status));
                }
                if app_status != 0 {
                    warn!("Responder exited with status {}", app_status);
                }

                debug!("Responder output: {}", abbreviate(&stdout, 256));
                return Ok(stdout);
            }
            other => {
                return Err(TransportError::ProtocolViolation(format!(
                    "unexpected record type {} from responder",
                    other.kind()
                )))
            }
        }
    }
}

/// Reads exactly one record off `input`
pub fn read_record<R: Read>(input: &mut R) -> Result<Record> {
    let mut bytes = vec![0; HEADER_LEN];
    input.read_exact(&mut bytes).map_err(eof_to_transport)?;

    let header: RecordHeader = match parser::header(&bytes) {
        Ok((_, header)) => header,
        Err(e) => return Err(TransportError::ProtocolViolation(format!("bad record header: {:?}", e))),
    };
    if header.version != VERSION {
        return Err(TransportError::ProtocolViolation(format!(
            "unsupported FastCGI version {}",
            header.version
        )));
    }

    bytes.resize(HEADER_LEN + header.body_length(), 0);
    input.read_exact(&mut bytes[HEADER_LEN..]).map_err(eof_to_transport)?;

    match parser::record(&bytes) {
        Ok((_, record)) => Ok(record),
        Err(_) => Err(TransportError::ProtocolViolation(format!(
            "undecodable record of type {}",
            header.kind
        ))),
    }
}

fn eof_to_transport(e: io::Error) -> TransportError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        TransportError::UnexpectedEof
    } else {
        TransportError::Io(e)
    }
}
