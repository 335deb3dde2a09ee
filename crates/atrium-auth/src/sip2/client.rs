//! Raw SIP2 transport: one `tokio::net::TcpStream` per exchange. The ACS
//! protocol is a plain request/response line terminated by `\r`; we write the
//! request and read until the terminator or timeout.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::AuthError;

pub struct Sip2Connection {
    stream: TcpStream,
    server: String,
    timeout: Duration,
}

impl Sip2Connection {
    pub async fn connect(server: &str, port: u16, timeout_secs: u64) -> Result<Self, AuthError> {
        let address = format!("{server}:{port}");
        let stream = timeout(Duration::from_secs(timeout_secs), TcpStream::connect(&address))
            .await
            .map_err(|_| AuthError::Unreachable { server: address.clone(), message: "connection timed out".into() })?
            .map_err(|err| AuthError::Unreachable { server: address.clone(), message: err.to_string() })?;
        Ok(Self { stream, server: server.to_string(), timeout: Duration::from_secs(timeout_secs) })
    }

    /// Writes `request` verbatim and reads back one `\r`-terminated response.
    pub async fn exchange(&mut self, request: &str) -> Result<String, AuthError> {
        timeout(self.timeout, self.stream.write_all(request.as_bytes()))
            .await
            .map_err(|_| AuthError::Unreachable { server: self.server.clone(), message: "write timed out".into() })?
            .map_err(|err| AuthError::Unreachable { server: self.server.clone(), message: err.to_string() })?;

        let mut response = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            let read = timeout(self.timeout, self.stream.read(&mut byte))
                .await
                .map_err(|_| AuthError::Unreachable { server: self.server.clone(), message: "read timed out".into() })?
                .map_err(|err| AuthError::Unreachable { server: self.server.clone(), message: err.to_string() })?;
            if read == 0 {
                return Err(AuthError::Unreachable { server: self.server.clone(), message: "connection closed early".into() });
            }
            if byte[0] == b'\r' {
                break;
            }
            response.push(byte[0]);
        }
        String::from_utf8(response)
            .map_err(|err| AuthError::Protocol { server: self.server.clone(), message: err.to_string() })
    }

    pub async fn disconnect(mut self) {
        let _ = self.stream.shutdown().await;
    }
}
