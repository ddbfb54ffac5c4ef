use super::*;

use thiserror::Error;
use toml::{Table, Value};

use std::fs;
use std::io;
use std::net::ToSocketAddrs;
use std::path::Path;

pub fn parse_file<P: AsRef<Path>>(conf: P) -> Result<Config, Error> {
    let toml = fs::read_to_string(conf)?;
    parse_str(&toml)
}

pub fn parse_str(toml: &str) -> Result<Config, Error> {
    match toml.parse::<Table>() {
        Ok(table) => config_from_table(&table),
        Err(e) => Err(Error::Parse(vec![message_from_error(toml, &e)])),
    }
}

/// Finds a dotted key like `listen.port`
fn lookup<'a>(table: &'a Table, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = table.get(parts.next()?)?;
    for part in parts {
        current = current.get(part)?;
    }
    Some(current)
}

fn port(table: &Table, key: &str, what: &str) -> Result<Option<u16>, Error> {
    match lookup(table, key) {
        Some(&Value::Integer(p)) if p <= u16::MAX as i64 && p > 0 => Ok(Some(p as u16)),
        Some(&Value::Integer(p)) => Err(Error::Validation(format!("The {} {} is out of range", what, p))),
        Some(val) => Err(Error::Validation(format!(
            "Expected the {} to be an integer, got a {}",
            what,
            val.type_str()
        ))),
        None => Ok(None),
    }
}

fn string<'a>(table: &'a Table, key: &str, what: &str) -> Result<Option<&'a str>, Error> {
    match lookup(table, key) {
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(val) => Err(Error::Validation(format!(
            "Expected the {} to be a string, got a {}",
            what,
            val.type_str()
        ))),
        None => Ok(None),
    }
}

fn config_from_table(table: &Table) -> Result<Config, Error> {
    let mut config: Config = Default::default();

    if let Some(p) = port(table, "listen.port", "port")? {
        config.port = p;
    }

    if let Some(root) = string(table, "kernel.document_root", "document root")? {
        config.kernel.document_root = PathBuf::from(root);
    }

    if let Some(script) = string(table, "kernel.front_controller", "front controller")? {
        config.kernel.front_controller = Some(String::from(script));
    }

    let fcgi_host = string(table, "fastcgi.host", "FastCGI host")?;
    let fcgi_port = port(table, "fastcgi.port", "FastCGI port")?;
    let fcgi_socket = string(table, "fastcgi.socket", "FastCGI socket")?;

    config.fcgi.address = match (fcgi_socket, fcgi_host, fcgi_port) {
        (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
            return Err(Error::Validation(String::from(
                "Give either a FastCGI socket or a host and port, not both",
            )))
        }
        (Some(socket), None, None) => Address::Unix(PathBuf::from(socket)),
        (None, host, port) => resolve(host.unwrap_or("127.0.0.1"), port.unwrap_or(9000))?,
    };

    match lookup(table, "fastcgi.timeout_secs") {
        Some(&Value::Integer(secs)) if secs > 0 => {
            config.fcgi.timeout = Some(Duration::from_secs(secs as u64))
        }
        Some(&Value::Integer(secs)) => {
            return Err(Error::Validation(format!("The FastCGI timeout {} must be positive", secs)))
        }
        Some(val) => {
            return Err(Error::Validation(format!(
                "Expected the FastCGI timeout to be an integer, got a {}",
                val.type_str()
            )))
        }
        None => (),
    }

    Ok(config)
}

fn resolve(host: &str, port: u16) -> Result<Address, Error> {
    let mut addrs = (host, port)
        .to_socket_addrs()
        .map_err(|e| Error::Validation(format!("Could not resolve FastCGI host {}: {}", host, e)))?;

    match addrs.next() {
        Some(addr) => Ok(Address::Tcp(addr)),
        None => Err(Error::Validation(format!("FastCGI host {} has no addresses", host))),
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("could not read config file: {0}")]
    Io(#[from] io::Error),

    #[error("config file is not valid TOML")]
    Parse(Vec<ErrorMessage>),

    #[error("{0}")]
    Validation(String),
}

/// An owned, rendered version of a TOML syntax error
#[derive(Debug, Clone)]
pub struct ErrorMessage {
    pub desc: String,
    pub line: usize,
    pub column: usize,
}

/// Convert a `toml::de::Error` into an `ErrorMessage`, with 1-based
/// positions
fn message_from_error(toml: &str, error: &toml::de::Error) -> ErrorMessage {
    let offset = error.span().map(|span| span.start).unwrap_or(0).min(toml.len());
    let before = &toml.as_bytes()[..offset];
    let line = before.iter().filter(|&&b| b == b'\n').count() + 1;
    let column = match before.iter().rposition(|&b| b == b'\n') {
        Some(newline) => offset - newline,
        None => offset + 1,
    };

    ErrorMessage {
        desc: String::from(error.message()),
        line,
        column,
    }
}
