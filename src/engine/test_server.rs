//! Minimal HTTP endpoint for upload tests.
//!
//! Runs on a plain thread so it keeps serving while the test's runtime is
//! parked on an `await`.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// A local endpoint that records request bodies.
pub struct TestServer {
    pub url: String,
    bodies: mpsc::Receiver<String>,
}

impl TestServer {
    /// Answers every request with `status`.
    pub fn responding(status: u16) -> Self {
        Self::spawn(Some(status))
    }

    /// Reads every request and never answers.
    pub fn hanging() -> Self {
        Self::spawn(None)
    }

    /// Returns the body of the next request, waiting up to five seconds.
    pub fn next_body(&self) -> Option<String> {
        self.bodies.recv_timeout(Duration::from_secs(5)).ok()
    }

    /// Returns a request body if one has arrived.
    pub fn try_body(&self) -> Option<String> {
        self.bodies.try_recv().ok()
    }

    fn spawn(status: Option<u16>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/locations", listener.local_addr().unwrap());
        let (tx, bodies) = mpsc::channel();

        thread::spawn(move || {
            let mut held = Vec::new();
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                let body = read_request(&mut stream);
                let _ = tx.send(body);
                match status {
                    Some(code) => {
                        let response = format!(
                            "HTTP/1.1 {code} Test\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                        );
                        let _ = stream.write_all(response.as_bytes());
                    }
                    None => held.push(stream),
                }
            }
        });

        Self { url, bodies }
    }
}

/// Returns a URL on which nothing is listening.
pub fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/locations")
}

fn read_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + length {
                return String::from_utf8_lossy(&buf[end + 4..end + 4 + length]).into_owned();
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}
