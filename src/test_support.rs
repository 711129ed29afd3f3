//! Local HTTP stub for exercising the payload fetch without the network.
//!
//! Runs on a plain thread so it works from both sync and async tests.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::time::Duration;

enum Behavior {
    Respond { status: u16, body: Vec<u8> },
    Hang,
}

/// A listener on `127.0.0.1` answering every connection the same way
pub struct StubServer {
    port: u16,
}

impl StubServer {
    /// Reply with `status` and `body` to every request
    pub fn respond(status: u16, body: &[u8]) -> Self {
        Self::start(Behavior::Respond {
            status,
            body: body.to_vec(),
        })
    }

    /// Accept connections but never answer
    pub fn hang() -> Self {
        Self::start(Behavior::Hang)
    }

    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}/handler.py", self.port)
    }

    fn start(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub server");
        let port = listener.local_addr().expect("stub address").port();

        std::thread::spawn(move || {
            let mut held = Vec::new();
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { continue };
                match &behavior {
                    Behavior::Respond { status, body } => {
                        read_request_head(&mut stream);
                        let head = format!(
                            "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                            status,
                            reason(*status),
                            body.len()
                        );
                        let _ = stream.write_all(head.as_bytes());
                        let _ = stream.write_all(body);
                        let _ = stream.flush();
                    }
                    Behavior::Hang => held.push(stream),
                }
            }
        });

        Self { port }
    }
}

/// A URL on a port nothing is listening on
pub fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind probe");
    let port = listener.local_addr().expect("probe address").port();
    drop(listener);
    format!("http://127.0.0.1:{}/handler.py", port)
}

fn read_request_head(stream: &mut TcpStream) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let mut seen = Vec::new();
    let mut buf = [0u8; 1024];
    while !seen.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => seen.extend_from_slice(&buf[..n]),
        }
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    }
}
