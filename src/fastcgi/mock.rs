//! An in-process FastCGI responder for tests
//!
//! It speaks just enough of the protocol to stand in for php-fpm: it
//! collects the params and stdin streams of one request per connection,
//! passes them to a handler, and streams the handler's output back.

use crate::cgi::Params;
use crate::errors::TransportError;
use crate::fastcgi::driver::read_record;
use crate::fastcgi::parser::name_value_pairs;
use crate::fastcgi::serializer;
use crate::fastcgi::{management_records, protocol_status, record_kind, Address, Client, Content};

use log::debug;

use std::io::{BufReader, BufWriter, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

type Handler = dyn Fn(&Params, &[u8]) -> Vec<u8> + Send + Sync;

pub struct MockResponder {
    address: SocketAddr,
    stopping: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl MockResponder {
    /// Starts listening on an ephemeral local port.
    ///
    /// `handler` gets each request's params and body and returns what the
    /// script would print: CGI headers, a blank line, then the body.
    pub fn start<F>(handler: F) -> MockResponder
    where
        F: Fn(&Params, &[u8]) -> Vec<u8> + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();
        let stopping = Arc::new(AtomicBool::new(false));
        let handler: Arc<Handler> = Arc::new(handler);

        let thread = {
            let stopping = Arc::clone(&stopping);
            thread::spawn(move || {
                for conn in listener.incoming() {
                    if stopping.load(Ordering::SeqCst) {
                        break;
                    }
                    match conn {
                        Ok(conn) => {
                            if let Err(e) = serve(&conn, &*handler) {
                                debug!("Mock responder connection ended: {}", e);
                            }
                        }
                        Err(e) => debug!("Mock responder accept failed: {}", e),
                    }
                }
            })
        };

        MockResponder {
            address,
            stopping,
            thread: Some(thread),
        }
    }

    pub fn address(&self) -> Address {
        Address::Tcp(self.address)
    }

    pub fn client(&self) -> Client {
        Client::new(self.address())
    }

    /// Whether the responder answers an FCGI_GET_VALUES query
    pub fn is_healthy(&self) -> bool {
        match self.client().get_values(&[management_records::MAX_CONNS]) {
            Ok(values) => !values.is_empty(),
            Err(_) => false,
        }
    }

    pub fn stop(&mut self) {
        if let Some(thread) = self.thread.take() {
            self.stopping.store(true, Ordering::SeqCst);
            // Wake the accept loop so it sees the flag.
            let _ = TcpStream::connect(self.address);
            let _ = thread.join();
        }
    }
}

impl Drop for MockResponder {
    fn drop(&mut self) {
        self.stop();
    }
}

fn serve(conn: &TcpStream, handler: &Handler) -> Result<(), TransportError> {
    let mut reader = BufReader::new(conn);
    let mut writer = BufWriter::new(conn);

    let mut id = 0;
    let mut params_stream = Vec::new();
    let mut params = Params::new();
    let mut stdin = Vec::new();

    loop {
        let record = read_record(&mut reader)?;
        match record.content {
            Content::GetValues(names) => {
                let answers: Vec<(&[u8], &[u8])> = names
                    .iter()
                    .filter_map(|pair| match &pair.name[..] {
                        management_records::MAX_CONNS => Some((management_records::MAX_CONNS, &b"1"[..])),
                        management_records::MAX_REQS => Some((management_records::MAX_REQS, &b"1"[..])),
                        management_records::MPXS_CONNS => Some((management_records::MPXS_CONNS, &b"0"[..])),
                        _ => None,
                    })
                    .collect();
                serializer::get_values_result(&mut writer, &answers)?;
                writer.flush()?;
            }
            Content::BeginRequest(_) => id = record.id,
            Content::Params(fragment) => {
                if fragment.is_empty() {
                    let pairs = name_value_pairs(&params_stream)
                        .map_err(|_| TransportError::ProtocolViolation(String::from("bad params")))?
                        .1;
                    for pair in pairs {
                        params.insert(
                            String::from_utf8_lossy(&pair.name).into_owned(),
                            String::from_utf8_lossy(&pair.value).into_owned(),
                        );
                    }
                } else {
                    params_stream.extend(fragment);
                }
            }
            Content::Stdin(data) => {
                if !data.is_empty() {
                    stdin.extend(data);
                    continue;
                }

                let output = handler(&params, &stdin);
                serializer::stream(&mut writer, record_kind::STDOUT, id, &output)?;
                serializer::end_request(&mut writer, id, 0, protocol_status::REQUEST_COMPLETE)?;
                writer.flush()?;
                return Ok(());
            }
            Content::AbortRequest => return Ok(()),
            other => {
                return Err(TransportError::ProtocolViolation(format!(
                    "mock responder got record type {}",
                    other.kind()
                )))
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn answers_management_queries() {
        let responder = MockResponder::start(|_, _| Vec::new());
        assert!(responder.is_healthy());

        let values = responder
            .client()
            .get_values(&[management_records::MPXS_CONNS, &b"FCGI_SOMETHING_ELSE"[..]])
            .unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].value, b"0");
    }

    #[test]
    fn round_trips_a_request() {
        let responder = MockResponder::start(|params, body| {
            let mut out = format!("X-Method: {}\r\n\r\n", params["REQUEST_METHOD"]).into_bytes();
            out.extend_from_slice(body);
            out
        });

        let mut params = Params::new();
        params.insert(String::from("REQUEST_METHOD"), String::from("PUT"));
        let body = vec![b'z'; 70_000];

        let output = responder.client().exchange(&params, &body).unwrap();
        let (head, rest) = output.split_at(15);
        assert_eq!(head, b"X-Method: PUT\r\n");
        assert_eq!(&rest[..2], b"\r\n");
        assert_eq!(rest.len() - 2, 70_000);
    }

    #[test]
    fn stopped_responder_is_unhealthy() {
        let mut responder = MockResponder::start(|_, _| Vec::new());
        responder.stop();
        assert!(!responder.is_healthy());
    }
}
