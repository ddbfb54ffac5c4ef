//! Handling HTTP requests with a FastCGI responder
//!
//! A `Kernel` turns a request into CGI meta-variables and a body, hands both
//! to an `Invoker` for the actual exchange, and decodes what comes back. It
//! keeps no state between calls, so one kernel can serve any number of
//! threads at once as long as its invoker can.

use crate::cgi::{self, Params};
use crate::errors::{Result, TransportError};
use crate::http::{Request, Response};

use log::{debug, info};

use std::path::{Path, PathBuf};

/// Something that can run one FastCGI exchange
pub trait Invoker {
    /// Sends `params` and `body` to the responder and returns everything it
    /// wrote to FCGI_STDOUT.
    fn invoke(&self, params: &Params, body: &[u8]) -> std::result::Result<Vec<u8>, TransportError>;
}

impl<F> Invoker for F
where
    F: Fn(&Params, &[u8]) -> std::result::Result<Vec<u8>, TransportError>,
{
    fn invoke(&self, params: &Params, body: &[u8]) -> std::result::Result<Vec<u8>, TransportError> {
        self(params, body)
    }
}

/// Serves HTTP requests out of a document root through a FastCGI responder
pub struct Kernel<I> {
    invoker: I,
    document_root: PathBuf,
    front_controller: Option<String>,
}

impl<I: Invoker> Kernel<I> {
    pub fn new<P: Into<PathBuf>>(invoker: I, document_root: P) -> Kernel<I> {
        Kernel {
            invoker,
            document_root: document_root.into(),
            front_controller: None,
        }
    }

    /// Routes requests for paths that aren't files through `script`.
    pub fn with_front_controller<S: Into<String>>(mut self, script: S) -> Kernel<I> {
        self.front_controller = Some(script.into());
        self
    }

    pub fn document_root(&self) -> &Path {
        &self.document_root
    }

    pub fn front_controller(&self) -> Option<&str> {
        self.front_controller.as_deref()
    }

    /// Runs `request` through the responder.
    ///
    /// Transport failures come back as `Error::Transport` and undecodable
    /// output as `Error::MalformedResponse`; neither is turned into a status
    /// code here.
    pub fn handle(&self, request: &Request) -> Result<Response> {
        let (params, body) = cgi::encode(request, &self.document_root, self.front_controller())?;

        let raw = self.invoker.invoke(&params, body.as_bytes())?;
        debug!("Responder wrote {} bytes for {}", raw.len(), request.uri);

        let response = cgi::decode(&raw)?;
        info!(
            "{} {} -> {} ({} bytes)",
            request.method,
            request.uri.path(),
            response.status,
            response.body.len()
        );

        Ok(response)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::errors::Error;
    use crate::testing::DocumentRoot;

    use std::io;
    use std::sync::{Arc, Mutex};

    fn reply(raw: &'static [u8]) -> impl Fn(&Params, &[u8]) -> std::result::Result<Vec<u8>, TransportError> {
        move |_: &Params, _: &[u8]| Ok(raw.to_vec())
    }

    #[test]
    fn handle_decodes_responder_output() {
        let root = DocumentRoot::with_scripts(&["hello.php"]);
        let kernel = Kernel::new(reply(b"Content-type: text/html\r\n\r\nHello World"), root.path());

        let response = kernel.handle(&Request::create("GET", "/hello.php").unwrap()).unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.headers.get("Content-type"), Some("text/html"));
        assert_eq!(response.body, b"Hello World");
    }

    #[test]
    fn invoker_sees_encoded_request() {
        let root = DocumentRoot::with_scripts(&["silex.php"]);
        let seen = Arc::new(Mutex::new(None));
        let recorder = {
            let seen = Arc::clone(&seen);
            move |params: &Params, body: &[u8]| -> std::result::Result<Vec<u8>, TransportError> {
                *seen.lock().unwrap() = Some((params.clone(), body.to_vec()));
                Ok(Vec::new())
            }
        };
        let kernel = Kernel::new(recorder, root.path()).with_front_controller("silex.php");

        let request = Request::create("POST", "/baz").unwrap().with_param("foo", "bar");
        let response = kernel.handle(&request).unwrap();
        assert!(response.body.is_empty());

        let (params, body) = seen.lock().unwrap().take().unwrap();
        assert_eq!(params["SCRIPT_NAME"], "/silex.php");
        assert_eq!(params["PATH_INFO"], "/baz");
        assert_eq!(params["REQUEST_METHOD"], "POST");
        assert_eq!(body, b"foo=bar");
    }

    #[test]
    fn transport_errors_propagate() {
        let root = DocumentRoot::with_scripts(&[]);
        let refused = |_: &Params, _: &[u8]| -> std::result::Result<Vec<u8>, TransportError> {
            Err(TransportError::Io(io::Error::new(io::ErrorKind::ConnectionRefused, "refused")))
        };
        let kernel = Kernel::new(refused, root.path());

        match kernel.handle(&Request::create("GET", "/").unwrap()) {
            Err(Error::Transport(TransportError::Io(ref e))) => {
                assert_eq!(e.kind(), io::ErrorKind::ConnectionRefused)
            }
            other => panic!("{:?}", other),
        }
    }

    #[test]
    fn malformed_output_is_distinct_from_transport_failure() {
        let root = DocumentRoot::with_scripts(&[]);
        let kernel = Kernel::new(reply(b"\x00\x01garbage\r\n\r\n"), root.path());

        match kernel.handle(&Request::create("GET", "/").unwrap()) {
            Err(Error::MalformedResponse(_)) => (),
            other => panic!("{:?}", other),
        }
    }

    #[test]
    fn kernel_is_shareable_across_threads() {
        let root = DocumentRoot::with_scripts(&["hello.php"]);
        let kernel = Arc::new(Kernel::new(reply(b"Status: 201 Created\r\n\r\nok"), root.path()));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let kernel = Arc::clone(&kernel);
                std::thread::spawn(move || {
                    let request = Request::create("GET", "/hello.php").unwrap();
                    kernel.handle(&request).unwrap().status
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 201);
        }
    }
}
