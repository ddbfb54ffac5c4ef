pub mod parser;

use crate::fastcgi::Address;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// A holder for app configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Port number to listen on
    pub port: u16,
    pub kernel: KernelConfig,
    pub fcgi: FastCgiConfig,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            port: 8000,
            kernel: Default::default(),
            fcgi: Default::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KernelConfig {
    /// Where the scripts are located on disk
    pub document_root: PathBuf,
    /// Script that handles every path which isn't a file, relative to
    /// `document_root`
    pub front_controller: Option<String>,
}

impl Default for KernelConfig {
    fn default() -> KernelConfig {
        KernelConfig {
            document_root: PathBuf::from("/var/www"),
            front_controller: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FastCgiConfig {
    pub address: Address,
    /// Applied to connecting and to every socket read and write
    pub timeout: Option<Duration>,
}

impl Default for FastCgiConfig {
    fn default() -> FastCgiConfig {
        FastCgiConfig {
            address: Address::Tcp(SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 9000)),
            timeout: None,
        }
    }
}
