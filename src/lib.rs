//! Serving HTTP requests through a FastCGI responder.
//!
//! A [`Kernel`] takes an [`http::Request`], encodes it as CGI
//! meta-variables plus a body, runs one FastCGI exchange through an
//! [`Invoker`], and decodes the responder's output into an
//! [`http::Response`]:
//!
//! ```no_run
//! use fcgi_http_kernel::fastcgi::{Address, Client};
//! use fcgi_http_kernel::{Kernel, Request};
//!
//! let client = Client::new(Address::Tcp("127.0.0.1:9000".parse().unwrap()));
//! let kernel = Kernel::new(client, "/var/www").with_front_controller("index.php");
//!
//! let request = Request::create("GET", "/hello?name=world").unwrap();
//! let response = kernel.handle(&request).unwrap();
//! println!("{} {}", response.status, String::from_utf8_lossy(&response.body));
//! ```
//!
//! The `server` module puts a small HTTP/1.1 listener in front of a kernel;
//! that is what the `fcgi-http-kernel` binary runs.

pub mod cgi;
pub mod config;
pub mod errors;
pub mod fastcgi;
pub mod filesystem;
pub mod http;
pub mod kernel;
pub mod log_util;
pub mod server;

#[cfg(test)]
mod testing;

pub use crate::errors::{Error, TransportError};
pub use crate::http::{Cookie, Request, Response};
pub use crate::kernel::{Invoker, Kernel};
