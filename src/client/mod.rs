//! Blocking client
//!
//! Opens one connection per request, writes the encoded command, half-closes
//! and reads back the single response frame.

use std::io::Write;
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use crate::error::Result;
use crate::protocol::{read_frame, Command, Response};

/// Client for an abkrdb server
#[derive(Debug, Clone)]
pub struct Client {
    address: String,
    timeout: Option<Duration>,
}

impl Client {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            timeout: None,
        }
    }

    /// Set a read timeout for responses
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Send a command and wait for its response
    pub fn send(&self, command: &Command) -> Result<Response> {
        self.send_raw(&command.encode())
    }

    /// Send a pre-encoded request
    pub fn send_raw(&self, request: &str) -> Result<Response> {
        let mut stream = TcpStream::connect(&self.address)?;
        stream.set_read_timeout(self.timeout)?;
        stream.write_all(request.as_bytes())?;
        stream.shutdown(Shutdown::Write)?;
        read_frame(&mut stream)
    }
}
